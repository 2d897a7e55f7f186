//! End-to-end run of the question-answering pipeline with offline models.

use std::path::Path;
use std::sync::Arc;

use assert_fs::TempDir;
use lopdf::content::{Content, Operation};
use lopdf::{Object, Stream, dictionary};
use sadiq::prelude::*;
use sadiq::query::ARABIC_ANSWER_PREFIX;
use sadiq::store::StoreError;

fn write_pdf(path: &Path, pages: &[&str]) -> anyhow::Result<()> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len())?;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path)?;
    Ok(())
}

fn sample_collection(dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    write_pdf(
        &dir.join("breeding.pdf"),
        &[
            "The Timahdite breed is raised in the Middle Atlas mountains.",
            "Ewes of this breed lamb once a year in late winter.",
        ],
    )?;
    write_pdf(
        &dir.join("health.pdf"),
        &["Lambs receive their first vaccination at eight weeks of age."],
    )?;
    Ok(())
}

#[tokio::test]
async fn index_then_reload_and_chat() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let temp = TempDir::new()?;
    let pdfs = temp.path().join("downloaded_pdfs");
    sample_collection(&pdfs)?;

    let config = RagConfig {
        db_root: temp.path().join("vector_db"),
        ..RagConfig::default()
    };
    let persist_dir = config.persist_directory_for(&pdfs);
    assert!(persist_dir.ends_with("downloaded_pdfs"));

    // Index.
    let pages = PdfLoader::new().load(&pdfs)?;
    assert_eq!(pages.len(), 3);
    let splitter = RecursiveCharacterTextSplitter::new(config.chunk_size, config.chunk_overlap)?;
    let chunks = splitter.split_documents(&pages);
    assert_eq!(chunks.len(), 3);

    VectorStore::from_documents(chunks, MockEmbedding::default(), Some(persist_dir.clone()))
        .await?;
    assert!(VectorStore::<MockEmbedding>::exists(&persist_dir));

    // Reload and chat.
    let store = VectorStore::load(&persist_dir, MockEmbedding::default()).await?;
    assert_eq!(store.len().await, 3);

    let llm = Arc::new(MockModel::new([
        "سلالة تمحضيت تربى في جبال الأطلس المتوسط.",
        "When do lambs get their first vaccination?",
        "تلقح الحملان في عمر ثمانية أسابيع.",
    ]));
    let mut chain =
        ConversationalRetrievalChain::builder(Arc::clone(&llm), store.as_retriever(config.top_k))
            .config(&config)
            .build();

    let first = query_documents(
        &mut chain,
        "Where is the Timahdite breed raised?",
        AnswerLanguage::Arabic,
    )
    .await?;
    assert_eq!(first.answer, "سلالة تمحضيت تربى في جبال الأطلس المتوسط.");
    assert_eq!(first.source_documents.len(), 3);
    assert!(first.source_documents[0].content.contains("Middle Atlas"));

    let second = query_documents(&mut chain, "And the lambs?", AnswerLanguage::Arabic).await?;
    assert_eq!(second.answer, "تلقح الحملان في عمر ثمانية أسابيع.");
    assert!(second.source_documents[0].content.contains("vaccination"));

    let prompts = llm.prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[0][1].content.starts_with(ARABIC_ANSWER_PREFIX));
    assert!(prompts[1][0].content.contains("Follow Up Input"));
    assert_eq!(prompts[2][1].content, "When do lambs get their first vaccination?");

    // Conversation survives a save/load round trip.
    let history = temp.path().join("history.json");
    chain.memory().save(&history).await?;
    let restored = ConversationMemory::load(&history).await?;
    assert_eq!(restored.len(), 4);
    assert_eq!(&restored, chain.memory());

    Ok(())
}

#[tokio::test]
async fn reload_with_another_embedding_model_fails() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let pdfs = temp.path().join("pdfs");
    sample_collection(&pdfs)?;

    let pages = PdfLoader::new().load(&pdfs)?;
    let dir = temp.path().join("index");
    VectorStore::from_documents(pages, MockEmbedding::default(), Some(dir.clone())).await?;

    let err = VectorStore::load(&dir, MockEmbedding::default().with_model_id("nomic-embed-text"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ModelMismatch { .. }));
    Ok(())
}
