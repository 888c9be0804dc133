// Deterministic backends and fixtures for end-to-end pipeline tests

use async_trait::async_trait;
use contract_qa::embeddings::Embedder;
use contract_qa::generation::{ChatMessage, FragmentIter, LanguageModel, Role};
use contract_qa::{ContractQaError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

const DIMENSION: usize = 64;

/// Topics the keyword model knows how to talk about
const TOPICS: [(&str, &str); 5] = [
    ("confidential", "Confidentiality"),
    ("termination", "Termination"),
    ("payment", "Payment"),
    ("parties", "Parties"),
    ("governing", "Governing law"),
];

/// Bag-of-words embedder hashing lower-cased words into buckets
#[derive(Default)]
pub struct HashEmbedder {
    calls: AtomicUsize,
}

impl HashEmbedder {
    /// Batches embedded so far, queries included
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|text| hash_vector(text)).collect())
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn name(&self) -> &str {
        "hash"
    }
}

fn hash_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; DIMENSION];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.len() > 2)
    {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in word.to_lowercase().bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        vector[(hash % DIMENSION as u64) as usize] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        vector[0] = 1.0;
    } else {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

/// Chat model that only repeats what its prompt contains
///
/// Summaries list a bullet per known topic found in the text. Answers quote
/// the first excerpt mentioning the question's topic with its citation, and
/// admit uncertainty when no excerpt does.
#[derive(Default)]
pub struct KeywordModel {
    calls: AtomicUsize,
}

impl KeywordModel {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn summarize(prompt: &str) -> String {
        let text = prompt.split_once("\nText:\n").map_or(prompt, |(_, text)| text);
        let lower = text.to_lowercase();
        TOPICS
            .iter()
            .filter(|(keyword, _)| lower.contains(keyword))
            .map(|(_, label)| format!("- {label}: covered by the contract"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn answer(messages: &[ChatMessage]) -> String {
        let question = messages
            .last()
            .map(|m| m.content.to_lowercase())
            .unwrap_or_default();
        let Some((keyword, label)) = TOPICS.iter().find(|(keyword, _)| question.contains(keyword))
        else {
            return "The provided excerpts do not answer this question; the answer is uncertain."
                .to_string();
        };

        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        for block in system.split("\n\n") {
            let block = block.strip_prefix("Context excerpts:\n").unwrap_or(block);
            let Some((number, excerpt)) = block
                .strip_prefix('[')
                .and_then(|rest| rest.split_once("] "))
            else {
                continue;
            };
            if number.parse::<usize>().is_err() {
                continue;
            }
            if let Some(line) = excerpt
                .lines()
                .find(|line| line.to_lowercase().contains(keyword))
            {
                return format!("{label}: {} [{number}]\n\nSources: [{number}]", line.trim());
            }
        }

        format!(
            "The provided excerpts do not mention {}. This is uncertain and no period can be stated.",
            label.to_lowercase()
        )
    }
}

impl LanguageModel for KeywordModel {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = messages
            .last()
            .ok_or_else(|| ContractQaError::Generation("empty prompt".to_string()))?;
        Ok(Self::summarize(&prompt.content))
    }

    fn stream(&self, messages: &[ChatMessage]) -> Result<FragmentIter> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = Self::answer(messages);
        let fragments: Vec<Result<String>> = answer
            .split_inclusive(' ')
            .map(|fragment| Ok(fragment.to_string()))
            .collect();
        Ok(Box::new(fragments.into_iter()))
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Write a PDF with one page per entry and one text line per string
pub fn write_pdf(path: &Path, pages: &[Vec<String>]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let y = 800 - 16 * i64::try_from(i).expect("small index");
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 8.into()]));
            operations.push(Operation::new("Td", vec![20.into(), y.into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(line.as_str())],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content should encode"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).expect("page count fits");
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("pdf should save");
}

/// A ten page services agreement; pages 3, 6 and 9 carry confidentiality clauses
pub fn services_agreement_pages() -> Vec<Vec<String>> {
    (1..=10)
        .map(|page| {
            let mut lines = vec![format!(
                "Section {page}. Schedule {page} of the Services Agreement between Acme Corp and Widget Ltd."
            )];
            if page % 3 == 0 {
                lines.push(format!(
                    "Clause {page}.1 Confidentiality. The Receiving Party shall keep all Confidential Information secret."
                ));
            }
            if page == 1 {
                lines.push("Clause 1.2 Payment. Fees are payable within thirty days of invoice.".to_string());
            }
            for line in 1..=14 {
                lines.push(format!(
                    "{page}.{line} The Supplier shall perform service item {line} of schedule {page} with due care and skill."
                ));
            }
            lines
        })
        .collect()
}

/// A short NDA without any termination clause
pub fn nda_without_termination() -> Vec<Vec<String>> {
    vec![
        vec![
            "Section 1. Parties. This agreement is made between Acme Corp and Widget Ltd.".to_string(),
            "Section 2. Confidentiality. Each party shall protect Confidential Information.".to_string(),
        ],
        vec![
            "Section 3. Governing law. This agreement is governed by the laws of England.".to_string(),
            "Section 4. Payment. No fees are payable under this agreement.".to_string(),
        ],
    ]
}
