//! Fan-out search over a wide-column table store.
//!
//! Each selected table is described for its key schema, scanned page by page
//! and every row is decoded to text before matching. Rows that fail to decode
//! are logged and skipped.

use tracing::{debug, info, trace, warn};

use crate::backends::{TableClient, TableRef};
use crate::decode::{DecodedRecord, DecoderFactory, Record, RecordDecoder, TableSchema};
use crate::errors::{SurfError, SurfResult};
use crate::metrics::SearchMetrics;
use crate::results::{TableHit, TableSearchOutput};
use crate::search::fanout::{scatter_gather, select_resources};
use crate::search::input::{MatchLevel, TableSearchInput};
use crate::search::matcher::Matcher;

pub struct TableSearcher<C, M, F> {
    client: C,
    matcher: M,
    decoders: F,
    metrics: SearchMetrics,
}

impl<C, M, F> TableSearcher<C, M, F>
where
    C: TableClient,
    M: Matcher,
    F: DecoderFactory,
{
    pub fn new(client: C, matcher: M, decoders: F) -> Self {
        Self {
            client,
            matcher,
            decoders,
            metrics: SearchMetrics::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: SearchMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    /// Names of the tables `input` would search, without scanning them.
    pub fn list_tables(&self, input: &TableSearchInput) -> SurfResult<Vec<TableRef>> {
        let tables = self.client.list_tables(input.with_global_tables)?;
        select_resources(
            &self.matcher,
            "tables",
            tables,
            |t| t.name.as_str(),
            &input.search.scope,
            input.limits,
        )
    }

    pub fn search(&self, input: &TableSearchInput) -> SurfResult<TableSearchOutput> {
        let search = &input.search;
        self.matcher.is_match(&search.pattern, "")?;

        let selected = self.list_tables(input)?;
        if selected.is_empty() {
            info!(pattern = %search.scope, "no tables selected");
            return Ok(TableSearchOutput::default());
        }

        if input.level == MatchLevel::TableNameOnly {
            let table_to_hits = selected
                .into_iter()
                .map(|t| {
                    let hit = TableHit {
                        table: t.name.clone(),
                        level: input.level,
                        data: DecodedRecord::new(),
                    };
                    (t.name, vec![hit])
                })
                .collect();
            return Ok(TableSearchOutput { table_to_hits });
        }

        info!(
            tables = selected.len(),
            parallel = search.parallel,
            level = %input.level,
            "searching tables"
        );
        let table_to_hits = scatter_gather(
            &selected,
            |t| t.name.clone(),
            search.parallel,
            search.fail_fast,
            &self.metrics,
            |table| self.search_table(table, input),
        )?;
        self.metrics.log_stats();

        Ok(TableSearchOutput { table_to_hits })
    }

    /// Describes, scans and matches a single table.
    pub fn search_table(&self, table: &TableRef, input: &TableSearchInput) -> SurfResult<Vec<TableHit>> {
        let schema = self.client.describe_table(table)?;
        let decoder = self.decoders.decoder_for(&schema);
        let stop_at_first = input.stops_at_first_hit();

        let mut hits = Vec::new();
        let mut failure: Option<SurfError> = None;

        self.client.scan(&table.name, &mut |page: &[Record]| {
            trace!(table = %table.name, items = page.len(), "scanning page");
            self.metrics.record_page();
            for record in page {
                self.metrics.record_items(1);
                let decoded = match decoder.decode(record) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        self.metrics.record_decode_failure();
                        warn!(table = %table.name, error = %e, "skipping undecodable record");
                        continue;
                    }
                };
                match self.record_matches(&decoded, &schema, input) {
                    Ok(true) => {
                        hits.push(TableHit {
                            table: table.name.clone(),
                            level: input.level,
                            data: decoded,
                        });
                        if stop_at_first {
                            return false;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        failure = Some(e);
                        return false;
                    }
                }
            }
            true
        })?;

        if let Some(e) = failure {
            return Err(e);
        }
        debug!(table = %table.name, hits = hits.len(), "table done");
        Ok(hits)
    }

    /// Attribute names are matched as `(name, query)`; values as
    /// `(query, value)` and only at the object and schema-keys levels.
    fn record_matches(
        &self,
        record: &DecodedRecord,
        schema: &TableSchema,
        input: &TableSearchInput,
    ) -> SurfResult<bool> {
        let query = input.search.pattern.as_str();
        let keys_only = input.level == MatchLevel::SchemaKeysOnly;
        let match_values = matches!(input.level, MatchLevel::Object | MatchLevel::SchemaKeysOnly);

        for (name, value) in record {
            if keys_only && !schema.is_key(name) {
                continue;
            }
            if self.name_matches(name, query)? {
                return Ok(true);
            }
            if match_values && self.matcher.is_match(query, value)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The attribute name is the needle here, and names come from the data.
    /// A name that is not a valid regex simply does not match.
    fn name_matches(&self, name: &str, query: &str) -> SurfResult<bool> {
        match self.matcher.is_match(name, query) {
            Err(e) if e.is_invalid_pattern() => {
                self.metrics.record_invalid_name();
                debug!(attribute = %name, error = %e, "attribute name is not a pattern");
                Ok(false)
            }
            other => other,
        }
    }
}
