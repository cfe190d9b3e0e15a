//! RAG corpus, retrieval tool and ingestion result types

use serde::{Deserialize, Serialize};

/// A corpus held by the managed RAG service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagCorpus {
    /// Full resource name, e.g. `projects/p/locations/l/ragCorpora/123`
    pub name: String,
    /// Human readable name used to select the corpus
    #[serde(default)]
    pub display_name: String,
}

/// Retrieval tool bound to one corpus, in the shape `generateContent` expects
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalTool {
    retrieval: Retrieval,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Retrieval {
    #[serde(rename = "vertexRagStore")]
    vertex_rag_store: VertexRagStore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct VertexRagStore {
    #[serde(rename = "ragResources")]
    rag_resources: Vec<RagResource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct RagResource {
    #[serde(rename = "ragCorpus")]
    rag_corpus: String,
}

impl RetrievalTool {
    /// Build a retrieval tool that grounds generation on `corpus`
    pub fn for_corpus(corpus: &RagCorpus) -> Self {
        Self {
            retrieval: Retrieval {
                vertex_rag_store: VertexRagStore {
                    rag_resources: vec![RagResource {
                        rag_corpus: corpus.name.clone(),
                    }],
                },
            },
        }
    }

    /// Corpus resource names the tool retrieves from
    pub fn corpora(&self) -> impl Iterator<Item = &str> {
        self.retrieval
            .vertex_rag_store
            .rag_resources
            .iter()
            .map(|r| r.rag_corpus.as_str())
    }
}

/// Counts reported by a finished ingestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: u64,
    pub skipped: u64,
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_tool_wire_shape() {
        let corpus = RagCorpus {
            name: "projects/p/locations/us-central1/ragCorpora/42".to_string(),
            display_name: "handbook".to_string(),
        };
        let tool = RetrievalTool::for_corpus(&corpus);
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(
            value["retrieval"]["vertexRagStore"]["ragResources"][0]["ragCorpus"],
            "projects/p/locations/us-central1/ragCorpora/42"
        );
        assert_eq!(tool.corpora().collect::<Vec<_>>(), vec![corpus.name.as_str()]);
    }

    #[test]
    fn test_corpus_from_api_json() {
        let corpus: RagCorpus = serde_json::from_str(
            r#"{"name": "projects/p/locations/l/ragCorpora/1", "displayName": "handbook", "createTime": "2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(corpus.display_name, "handbook");
    }
}
