use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, TextAnalyzer, TokenStream};
use tantivy::Index;

/// Name under which [`build_analyzer`] is registered on every index.
pub const TOKENIZER_NAME: &str = "kb_alnum_lower";

#[derive(Debug, Clone, Copy)]
pub struct KbFields {
	pub id: Field,
	pub text: Field,
}

pub fn build_schema() -> (Schema, KbFields) {
	let mut schema_builder = Schema::builder();
	let id = schema_builder.add_text_field("id", STRING | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER_NAME).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	let text = schema_builder.add_text_field("text", text_options);
	(schema_builder.build(), KbFields { id, text })
}

/// Maximal alphanumeric runs, lowercased. No stemming and no stop words.
pub fn build_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(TOKENIZER_NAME, build_analyzer());
}

/// Tokenize `text` exactly as documents and queries are tokenized.
pub fn tokenize(text: &str) -> Vec<String> {
	let mut analyzer = build_analyzer();
	let mut stream = analyzer.token_stream(text);
	let mut tokens = Vec::new();
	while stream.advance() {
		tokens.push(stream.token().text.clone());
	}
	tokens
}
