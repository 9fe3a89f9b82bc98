//! In-memory fuzzy index over the bound tool catalogue.
//!
//! Rebuilt from scratch on every namespace bind; never mutated in
//! place. Indexes `method`, `description`, and the concatenated
//! parameter descriptions; query tokens are OR-combined with prefix
//! matching and a per-token edit distance derived from the fuzziness
//! knob. Scores are normalized by the top hit into `(0, 1]` so the
//! shared dynamic-limit selector sees the same score space as the
//! vector backend.

use tantivy::{
    collector::TopDocs,
    doc,
    query::{BooleanQuery, BoostQuery, FuzzyTermQuery, Occur, Query},
    schema::{Field, Schema, Value, STORED, STRING, TEXT},
    Index, IndexReader, IndexWriter, TantivyDocument, Term,
};

use crate::{catalog::ToolKey, error::ProxyResult};

/// One document to index: the searchable text of a bound tool.
#[derive(Debug, Clone)]
pub struct LexicalEntry {
    pub tool_id: String,
    pub method: String,
    pub description: String,
    pub parameter_descriptions: String,
}

pub struct LexicalIndex {
    reader: IndexReader,
    method: Field,
    description: Field,
    params: Field,
    tool_id: Field,
    len: usize,
}

impl LexicalIndex {
    /// Build a fresh in-RAM index over the given entries.
    pub fn build(entries: &[LexicalEntry]) -> ProxyResult<Self> {
        let mut builder = Schema::builder();
        let method = builder.add_text_field("method", TEXT | STORED);
        let description = builder.add_text_field("description", TEXT);
        let params = builder.add_text_field("parameter_descriptions", TEXT);
        let tool_id = builder.add_text_field("tool_id", STRING | STORED);
        let schema = builder.build();

        let index = Index::create_in_ram(schema);
        let mut writer: IndexWriter = index.writer(15_000_000)?;
        for entry in entries {
            writer.add_document(doc!(
                method => entry.method.as_str(),
                description => entry.description.as_str(),
                params => entry.parameter_descriptions.as_str(),
                tool_id => entry.tool_id.as_str(),
            ))?;
        }
        writer.commit()?;

        let reader = index.reader()?;

        Ok(Self {
            reader,
            method,
            description,
            params,
            tool_id,
            len: entries.len(),
        })
    }

    /// Build an index with no documents (the unbound state).
    pub fn empty() -> ProxyResult<Self> {
        Self::build(&[])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Search with OR-combined fuzzy prefix terms.
    ///
    /// Returns `(key, score)` pairs, best first, with scores divided by
    /// the top raw score. Empty query or empty index yields no results.
    pub fn search(
        &self,
        query: &str,
        fuzzy: f32,
        description_boost: f32,
        limit: usize,
    ) -> ProxyResult<Vec<(ToolKey, f32)>> {
        let tokens: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if tokens.is_empty() || self.len == 0 || limit == 0 {
            return Ok(Vec::new());
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for token in &tokens {
            let distance = edit_distance_for(token, fuzzy);
            for field in [self.method, self.description, self.params] {
                let term = Term::from_field_text(field, token);
                let fuzzy_query = FuzzyTermQuery::new_prefix(term, distance, true);
                let clause: Box<dyn Query> = if field == self.description {
                    Box::new(BoostQuery::new(Box::new(fuzzy_query), description_boost))
                } else {
                    Box::new(fuzzy_query)
                };
                clauses.push((Occur::Should, clause));
            }
        }

        let searcher = self.reader.searcher();
        let top = searcher.search(&BooleanQuery::new(clauses), &TopDocs::with_limit(limit))?;

        let mut results = Vec::with_capacity(top.len());
        for (score, address) in top {
            let document: TantivyDocument = searcher.doc(address)?;
            let tool_id = document
                .get_first(self.tool_id)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let method = document
                .get_first(self.method)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            results.push((ToolKey::new(tool_id, method), score));
        }

        // Normalize into (0, 1] so lexical output shares the vector
        // backend's score space.
        if let Some(&(_, top_score)) = results.first() {
            if top_score > 0.0 {
                for (_, score) in &mut results {
                    *score /= top_score;
                }
            }
        }

        Ok(results)
    }
}

/// Map the `[0,1]` fuzziness knob to a per-token Levenshtein distance.
///
/// Longer tokens tolerate more edits; tantivy's automata cap at 2.
fn edit_distance_for(token: &str, fuzzy: f32) -> u8 {
    let budget = (fuzzy.clamp(0.0, 1.0) * token.chars().count() as f32).floor() as u8;
    budget.min(2)
}
