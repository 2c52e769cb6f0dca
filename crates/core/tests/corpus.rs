use std::fs;

use tempfile::tempdir;
use triage_core::corpus::{collect_transcripts, list_samples, sha256_file, CorpusLayout};
use triage_core::model::ExploitabilityTag;

#[test]
fn layout_names_directories_after_tags() {
    let layout = CorpusLayout::new("/crashes");
    assert_eq!(
        layout.classification_dir(ExploitabilityTag::ProbablyExploitable),
        std::path::Path::new("/crashes/PROBABLY_EXPLOITABLE")
    );
    assert_eq!(
        layout.sidecar_path(ExploitabilityTag::Unknown, "id_000001"),
        std::path::Path::new("/crashes/UNKNOWN/id_000001.log")
    );
    assert_eq!(
        layout.filed_sample_path(ExploitabilityTag::Exploitable, "id_000001"),
        std::path::Path::new("/crashes/EXPLOITABLE/id_000001")
    );
}

#[test]
fn samples_are_top_level_files_in_order() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("b"), b"b").expect("write");
    fs::write(dir.path().join("a"), b"a").expect("write");
    fs::create_dir(dir.path().join("EXPLOITABLE")).expect("mkdir");
    fs::write(dir.path().join("EXPLOITABLE").join("c"), b"c").expect("write");

    let samples = list_samples(dir.path()).expect("list");
    assert_eq!(samples, vec![dir.path().join("a"), dir.path().join("b")]);
}

#[test]
fn transcripts_optionally_recurse() {
    let dir = tempdir().expect("tempdir");
    let nested = dir.path().join("EXPLOITABLE");
    fs::create_dir(&nested).expect("mkdir");
    fs::write(dir.path().join("top.log"), "").expect("write");
    fs::write(dir.path().join("sample.bin"), "").expect("write");
    fs::write(nested.join("id_1.log"), "").expect("write");

    assert_eq!(collect_transcripts(dir.path(), false).expect("flat"), vec![dir.path().join("top.log")]);

    let all = collect_transcripts(dir.path(), true).expect("recursive");
    assert_eq!(all, vec![nested.join("id_1.log"), dir.path().join("top.log")]);
}

#[test]
fn missing_directory_is_an_error() {
    let dir = tempdir().expect("tempdir");
    assert!(list_samples(&dir.path().join("nope")).is_err());
    assert!(collect_transcripts(&dir.path().join("nope"), true).is_err());
}

#[test]
fn hashes_sample_contents() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("abc");
    fs::write(&path, b"abc").expect("write");

    assert_eq!(
        sha256_file(&path).expect("hash"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
