//! HTML fragments rendered with tera.
//!
//! Templates are compiled into the binary. Their names end in `.html` so tera autoescapes
//! every interpolated value.

use serde::Serialize;
use std::sync::Arc;
use tera::{Context, Tera};

use crate::errors::ServiceError;
use crate::services::{
    cart::CartSummary,
    live_board::{BoardCard, BoardSnapshot, RequestDetail},
};

const CART: &str = "guest/cart.html";
const LIVE_BOARD: &str = "portal/live_board.html";
const REQUEST_DETAIL: &str = "portal/request_detail.html";

#[derive(Serialize)]
struct BoardColumn<'a> {
    key: &'static str,
    title: &'static str,
    cards: &'a [BoardCard],
}

#[derive(Clone)]
pub struct Views {
    tera: Arc<Tera>,
}

impl Views {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (CART, include_str!("../../templates/guest/cart.html")),
            (LIVE_BOARD, include_str!("../../templates/portal/live_board.html")),
            (
                REQUEST_DETAIL,
                include_str!("../../templates/portal/request_detail.html"),
            ),
        ])?;
        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    pub fn cart_fragment(&self, cart: &CartSummary) -> Result<String, ServiceError> {
        let mut ctx = Context::new();
        ctx.insert("cart", cart);
        Ok(self.tera.render(CART, &ctx)?)
    }

    /// Full board page with the initial snapshot embedded as JSON for the polling script
    pub fn live_board_page(
        &self,
        snapshot: &BoardSnapshot,
        board_url: &str,
        poll_interval_secs: u64,
    ) -> Result<String, ServiceError> {
        let columns = [
            BoardColumn {
                key: "new",
                title: "New",
                cards: &snapshot.new,
            },
            BoardColumn {
                key: "accepted",
                title: "Accepted",
                cards: &snapshot.accepted,
            },
        ];

        let mut ctx = Context::new();
        ctx.insert("columns", &columns);
        ctx.insert("counts", &snapshot.counts);
        ctx.insert("board_url", board_url);
        ctx.insert("poll_url", &format!("{board_url}/poll"));
        ctx.insert("poll_interval_ms", &(poll_interval_secs * 1000));
        ctx.insert("snapshot_json", &script_safe_json(snapshot)?);
        Ok(self.tera.render(LIVE_BOARD, &ctx)?)
    }

    pub fn request_detail(&self, detail: &RequestDetail) -> Result<String, ServiceError> {
        let mut ctx = Context::new();
        ctx.insert("detail", detail);
        Ok(self.tera.render(REQUEST_DETAIL, &ctx)?)
    }
}

/// JSON that cannot terminate the surrounding `<script>` element.
fn script_safe_json<T: Serialize>(value: &T) -> Result<String, ServiceError> {
    let json = serde_json::to_string(value)
        .map_err(|e| ServiceError::InternalError(format!("snapshot serialization failed: {e}")))?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}
