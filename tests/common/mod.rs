//! Shared fixtures: generated PDFs, catalog folders and fake providers.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use pensionbot_lib::{
    AnswerStream, CompletionProvider, Embedding, EmbeddingProvider, HashingEmbedder, ProviderError,
};

/// Write a PDF with one page per entry. `None` gives a page without text.
pub fn write_pdf(path: &Path, pages: &[Option<&str>]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in pages {
        let operations = match page {
            Some(text) => vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
            None => vec![],
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create pdf folder");
    }
    doc.save(path).expect("save pdf");
}

/// Text-only PDF
pub fn write_text_pdf(path: &Path, pages: &[&str]) {
    let pages: Vec<Option<&str>> = pages.iter().map(|p| Some(*p)).collect();
    write_pdf(path, &pages);
}

/// Catalog root with `AcmeCorp/policy.pdf`, an image-only scan and an
/// empty `EmptyCo` category.
pub fn sample_catalog() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("create temp dir");
    write_text_pdf(
        &dir.path().join("AcmeCorp").join("policy.pdf"),
        &["Pension rate is 2.5%.", "Effective 2024."],
    );
    write_pdf(&dir.path().join("AcmeCorp").join("scan.pdf"), &[None, None]);
    fs::create_dir_all(dir.path().join("EmptyCo")).expect("create EmptyCo");
    dir
}

/// Hashing embedder that counts how often it is called
#[derive(Default)]
pub struct CountingEmbedder {
    pub calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for CountingEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        HashingEmbedder.embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        HashingEmbedder.embed_query(text).await
    }
}

/// Answers with the document text quoted in the prompt and records prompts
#[derive(Default)]
pub struct EchoCompletion {
    pub prompts: Mutex<Vec<String>>,
}

impl EchoCompletion {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl CompletionProvider for EchoCompletion {
    async fn stream_completion(&self, prompt: &str) -> Result<AnswerStream, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let quoted = prompt
            .split("Gegeven de tekst uit de documenten: '")
            .nth(1)
            .and_then(|rest| rest.split("', en de vraag").next())
            .unwrap_or_default()
            .to_string();

        Ok(AnswerStream::from_fragments(vec![
            "Volgens het document: ".to_string(),
            quoted,
            "\nConclusie: zie hierboven.".to_string(),
        ]))
    }
}

/// Fails every completion request
pub struct FailingCompletion;

impl CompletionProvider for FailingCompletion {
    async fn stream_completion(&self, _prompt: &str) -> Result<AnswerStream, ProviderError> {
        Err(ProviderError::Api { status: 401, message: "invalid api key".to_string() })
    }
}
