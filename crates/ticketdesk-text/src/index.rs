use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex, RwLock};
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term};
use tracing::{debug, info};

use ticketdesk_core::traits::TextIndexer;
use ticketdesk_core::types::SearchHit;

use crate::tantivy_utils::{build_schema, register_tokenizer, tokenize, KbFields};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// One published generation of the index: a RAM index, its writer and a
/// manually reloaded reader. Searchers taken from `reader` are immutable.
struct Generation {
	fields: KbFields,
	reader: IndexReader,
	writer: Mutex<IndexWriter>,
}

impl Generation {
	fn empty() -> Result<Self> {
		let (schema, fields) = build_schema();
		let index = Index::create_in_ram(schema);
		register_tokenizer(&index);
		// Single indexing thread keeps segment layout, and so tie order, deterministic.
		let writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Self { fields, reader, writer: Mutex::new(writer) })
	}

	fn stage(&self, writer: &mut IndexWriter, id: &str, text: &str) -> Result<()> {
		writer.delete_term(Term::from_field_text(self.fields.id, id));
		writer.add_document(doc!(self.fields.id => id.to_string(), self.fields.text => text.to_string()))?;
		Ok(())
	}

	fn publish(&self, writer: &mut IndexWriter) -> Result<()> {
		writer.commit()?;
		self.reader.reload()?;
		Ok(())
	}
}

/// In-memory BM25 index over `(id, text)` documents.
///
/// Readers only ever see committed generations: `build` assembles a complete
/// new index off to the side and swaps it in, `add` commits a single-document
/// segment and reloads the reader. Searches taken through [`LexicalSnapshot`]
/// keep their view for as long as the snapshot lives.
pub struct LexicalIndex {
	current: RwLock<Arc<Generation>>,
	mutation: Mutex<()>,
}

impl LexicalIndex {
	pub fn new() -> Result<Self> {
		Ok(Self { current: RwLock::new(Arc::new(Generation::empty()?)), mutation: Mutex::new(()) })
	}

	/// Replace the whole corpus. Later duplicates of an id win.
	pub fn build<I, S, T>(&self, corpus: I) -> Result<usize>
	where
		I: IntoIterator<Item = (S, T)>,
		S: AsRef<str>,
		T: AsRef<str>,
	{
		let _guard = self.mutation.lock().map_err(|_| anyhow!("lexical index mutation lock poisoned"))?;
		let next = Generation::empty()?;
		{
			let mut writer = next.writer.lock().map_err(|_| anyhow!("lexical index writer lock poisoned"))?;
			for (id, text) in corpus {
				next.stage(&mut writer, id.as_ref(), text.as_ref())?;
			}
			next.publish(&mut writer)?;
		}
		let count = usize::try_from(next.reader.searcher().num_docs()).unwrap_or(usize::MAX);
		*self.current.write().map_err(|_| anyhow!("lexical index snapshot lock poisoned"))? = Arc::new(next);
		info!(docs = count, "lexical index rebuilt");
		Ok(count)
	}

	/// Add one document; an existing document with the same id is replaced.
	pub fn add(&self, id: &str, text: &str) -> Result<()> {
		let _guard = self.mutation.lock().map_err(|_| anyhow!("lexical index mutation lock poisoned"))?;
		let generation = self.generation()?;
		let mut writer = generation.writer.lock().map_err(|_| anyhow!("lexical index writer lock poisoned"))?;
		generation.stage(&mut writer, id, text)?;
		generation.publish(&mut writer)?;
		debug!(id, "lexical document added");
		Ok(())
	}

	/// A consistent read view of the current generation.
	pub fn snapshot(&self) -> Result<LexicalSnapshot> {
		let generation = self.generation()?;
		Ok(LexicalSnapshot { fields: generation.fields, searcher: generation.reader.searcher() })
	}

	pub fn len(&self) -> Result<usize> {
		Ok(self.snapshot()?.len())
	}

	pub fn is_empty(&self) -> Result<bool> {
		Ok(self.len()? == 0)
	}

	pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		self.snapshot()?.search(query, k)
	}

	fn generation(&self) -> Result<Arc<Generation>> {
		self.current
			.read()
			.map(|g| Arc::clone(&*g))
			.map_err(|_| anyhow!("lexical index snapshot lock poisoned"))
	}
}

impl TextIndexer for LexicalIndex {
	fn add(&self, id: &str, text: &str) -> Result<()> {
		LexicalIndex::add(self, id, text)
	}

	fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		LexicalIndex::search(self, query, k)
	}
}

/// Point-in-time view over one committed generation.
pub struct LexicalSnapshot {
	fields: KbFields,
	searcher: Searcher,
}

impl LexicalSnapshot {
	pub fn len(&self) -> usize {
		usize::try_from(self.searcher.num_docs()).unwrap_or(usize::MAX)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Top `k` documents by BM25, summed over every query token.
	pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		let tokens = tokenize(query);
		if k == 0 || tokens.is_empty() || self.is_empty() {
			return Ok(vec![]);
		}
		// TopDocs sizes its heap from the limit.
		let k = k.min(self.len());
		let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
			.iter()
			.map(|t| {
				let term = Term::from_field_text(self.fields.text, t);
				(Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
			})
			.collect();
		let q = BooleanQuery::new(clauses);
		let top_docs = self.searcher.search(&q, &TopDocs::with_limit(k))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = self.searcher.doc(addr)?;
			let id = doc.get_first(self.fields.id).and_then(|v| v.as_str()).unwrap_or("").to_string();
			hits.push(SearchHit::text(id, score));
		}
		debug!(tokens = tokens.len(), hits = hits.len(), "lexical search");
		Ok(hits)
	}
}
