//! Inline query handler: search-as-you-type answered straight from the snapshot

use anyhow::{Context, Result};
use tracing::debug;

use crate::catalog::CatalogSnapshot;
use crate::config::INLINE_RESULT_LIMIT;
use crate::event::Sender;

use super::ui_builder::inline_results;
use super::Storefront;

impl Storefront {
    /// Answer an inline query; never touches carts or sessions
    pub(crate) async fn handle_inline_query(
        &self,
        query_id: &str,
        from: &Sender,
        query: &str,
        snapshot: &CatalogSnapshot,
    ) -> Result<()> {
        let language_code = from.language_code.as_deref();
        let hits = snapshot.search(query, INLINE_RESULT_LIMIT);
        debug!(customer_id = from.id, query, hits = hits.len(), "Inline query");

        let results = inline_results(snapshot, &hits, language_code);
        self.transport
            .answer_inline_query(query_id, results)
            .await
            .with_context(|| format!("Failed to answer inline query {query_id}"))
    }
}
