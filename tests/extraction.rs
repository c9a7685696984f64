mod common;

use pensionbot_lib::{extract_text_from_pdf_by_page, ExtractError};

#[test]
fn test_pages_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("three.pdf");
    common::write_text_pdf(&path, &["First page", "Second page", "Third page"]);

    let pages = extract_text_from_pdf_by_page(&path).unwrap();
    assert_eq!(pages.len(), 3);
    assert!(pages[0].contains("First page"));
    assert!(pages[1].contains("Second page"));
    assert!(pages[2].contains("Third page"));
}

#[test]
fn test_blank_pages_are_omitted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.pdf");
    common::write_pdf(&path, &[Some("Opbouw 1,875%"), None, Some("Franchise 17.545")]);

    let pages = extract_text_from_pdf_by_page(&path).unwrap();
    assert_eq!(pages.len(), 2);
    assert!(pages[0].contains("Opbouw 1,875%"));
    assert!(pages[1].contains("Franchise 17.545"));
}

#[test]
fn test_image_only_pdf_has_no_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.pdf");
    common::write_pdf(&path, &[None, None]);

    let result = extract_text_from_pdf_by_page(&path);
    assert!(matches!(result, Err(ExtractError::NoText)));
}
