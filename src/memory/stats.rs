use std::collections::BTreeMap;

use crate::context::RequestContext;
use crate::error::Result;
use crate::memory::types::{Category, FactStats};

use super::store::FactStore;

impl FactStore {
    /// Count active facts, in total and per category.
    ///
    /// Every category appears in `by_category`, with zero when empty.
    pub fn stats(&self, ctx: &RequestContext) -> Result<FactStats> {
        self.database().with_conn(ctx, |conn| {
            let mut by_category: BTreeMap<String, u64> = Category::ALL
                .iter()
                .map(|c| (c.as_str().to_string(), 0))
                .collect();

            let mut stmt = conn.prepare(
                "SELECT category, COUNT(*) FROM facts \
                 WHERE deleted_at IS NULL GROUP BY category",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (category, count) = row?;
                by_category.insert(category, count as u64);
            }

            let total = by_category.values().sum();
            Ok(FactStats { total, by_category })
        })
    }
}
