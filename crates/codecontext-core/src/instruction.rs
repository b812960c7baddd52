use serde::{Deserialize, Serialize};

/// Retrieval instruction attached to every embedding call.
///
/// Queries pick a `*Query` variant; passages at index time pick the matching
/// `*Passage` variant based on the chunk type (code vs document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionType {
    Nl2CodeQuery,
    Nl2CodePassage,
    Code2CodeQuery,
    Code2CodePassage,
    QaQuery,
    QaPassage,
    DocumentPassage,
}

impl InstructionType {
    pub const ALL: [InstructionType; 7] = [
        InstructionType::Nl2CodeQuery,
        InstructionType::Nl2CodePassage,
        InstructionType::Code2CodeQuery,
        InstructionType::Code2CodePassage,
        InstructionType::QaQuery,
        InstructionType::QaPassage,
        InstructionType::DocumentPassage,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            InstructionType::Nl2CodeQuery => "nl2code_query",
            InstructionType::Nl2CodePassage => "nl2code_passage",
            InstructionType::Code2CodeQuery => "code2code_query",
            InstructionType::Code2CodePassage => "code2code_passage",
            InstructionType::QaQuery => "qa_query",
            InstructionType::QaPassage => "qa_passage",
            InstructionType::DocumentPassage => "document_passage",
        }
    }

    /// Prefix prepended to the text before it reaches the embedding model.
    pub const fn prefix(self) -> &'static str {
        match self {
            InstructionType::Nl2CodeQuery => {
                "Represent this query for retrieving relevant code: "
            }
            InstructionType::Nl2CodePassage => "Represent this code snippet for retrieval: ",
            InstructionType::Code2CodeQuery => "Represent this code for finding similar code: ",
            InstructionType::Code2CodePassage => {
                "Represent this code snippet for similarity matching: "
            }
            InstructionType::QaQuery => {
                "Represent this question for retrieving supporting passages: "
            }
            InstructionType::QaPassage => "Represent this passage for answering questions: ",
            InstructionType::DocumentPassage => "Represent this document section for retrieval: ",
        }
    }

    pub fn parse(raw: &str) -> Option<InstructionType> {
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == raw.trim().to_ascii_lowercase())
    }

    pub const fn is_query(self) -> bool {
        matches!(
            self,
            InstructionType::Nl2CodeQuery
                | InstructionType::Code2CodeQuery
                | InstructionType::QaQuery
        )
    }
}

impl std::fmt::Display for InstructionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_stable() {
        assert_eq!(InstructionType::Nl2CodeQuery.as_str(), "nl2code_query");
        assert_eq!(
            InstructionType::DocumentPassage.as_str(),
            "document_passage"
        );
        assert_eq!(InstructionType::ALL.len(), 7);
    }

    #[test]
    fn every_variant_has_a_distinct_prefix() {
        let mut prefixes: Vec<&str> = InstructionType::ALL.iter().map(|i| i.prefix()).collect();
        prefixes.sort_unstable();
        prefixes.dedup();
        assert_eq!(prefixes.len(), 7);
    }

    #[test]
    fn parse_accepts_wire_names() {
        assert_eq!(
            InstructionType::parse("nl2code_query"),
            Some(InstructionType::Nl2CodeQuery)
        );
        assert_eq!(InstructionType::parse("bogus"), None);
    }
}
