//! Asking questions, optionally forcing an Arabic answer.

use serde::{Deserialize, Serialize};

use crate::chain::ConversationalRetrievalChain;
use crate::document::Document;
use crate::error::Result;

/// Instruction prepended to questions when an Arabic answer is required.
pub const ARABIC_ANSWER_PREFIX: &str = "يرجى الإجابة على السؤال التالي باللغة العربية: ";

/// Language the answer should be written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerLanguage {
    /// Always answer in Arabic.
    #[default]
    Arabic,
    /// Leave the question untouched; the model usually mirrors its language.
    AsAsked,
}

impl AnswerLanguage {
    /// The question as it should be sent to the chain.
    #[must_use]
    pub fn wrap(self, question: &str) -> String {
        match self {
            Self::Arabic => format!("{ARABIC_ANSWER_PREFIX}{question}"),
            Self::AsAsked => question.to_string(),
        }
    }
}

/// Answer to a user question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    /// The model's answer.
    pub answer: String,
    /// Chunks the answer drew on.
    pub source_documents: Vec<Document>,
}

/// Ask `question` through `chain` in the requested `language`.
///
/// # Errors
///
/// Returns an error if retrieval or generation fails.
pub async fn query_documents(
    chain: &mut ConversationalRetrievalChain,
    question: &str,
    language: AnswerLanguage,
) -> Result<QueryResponse> {
    let response = chain.invoke(&language.wrap(question)).await?;
    Ok(QueryResponse {
        answer: response.answer,
        source_documents: response.source_documents,
    })
}
