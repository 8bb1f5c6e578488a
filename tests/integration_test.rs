//! Integration tests for patdex
//!
//! End-to-end runs of the ingest pipeline against the in-memory and sled
//! stores, using small dumps shaped like the weekly bulk files.

use patdex::{
    ingest::{
        frame, DumpFile, FailureStage, IngestCheckpoint, IngestPipelineBuilder, RetryPolicy,
    },
    store::{MemoryStore, PatentStore, SledStore},
    PatentType,
};
use serde_json::json;
use std::io::{Cursor, Write};
use std::time::Duration;
use tempfile::TempDir;

/// One document of the given kind; `title: None` leaves out `invention-title`
fn patent_xml(patent_type: PatentType, app_doc_id: &str, title: Option<&str>) -> String {
    let root = patent_type.root_tag();
    let bib = patent_type.bibliographic_tag();
    let title = title
        .map(|t| format!("<invention-title id=\"d2e43\">{}</invention-title>", t))
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE {root} SYSTEM "{root}-v47-2022-02-17.dtd" [ ]>
<{root} lang="EN" dtd-version="v4.7 2022-02-17" file="{app_doc_id}.XML" status="PRODUCTION" id="{root}" country="US" date-produced="20240102" date-publ="20240116">
<{bib}>
<publication-reference>
<document-id>
<country>US</country>
<doc-number>P-{app_doc_id}</doc-number>
<kind>B1</kind>
<date>20240116</date>
</document-id>
</publication-reference>
<application-reference appl-type="utility">
<document-id>
<country>US</country>
<doc-number>{app_doc_id}</doc-number>
<date>20200607</date>
</document-id>
</application-reference>


<classifications-ipcr>
<classification-ipcr>
<ipc-version-indicator><date>20060101</date></ipc-version-indicator>
<section>A</section>
<class>01</class>
<subclass>B</subclass>
</classification-ipcr>
</classifications-ipcr>
{title}
<us-parties>
<inventors>
<inventor sequence="00" designation="us-only">
<addressbook>
<last-name>Moreau</last-name>
<first-name>Camille</first-name>
</addressbook>
</inventor>
</inventors>
</us-parties>
</{bib}>
<abstract id="abstract">
<p id="p-0001" num="0000">A tiller blade with a <b>replaceable</b> edge.</p>
</abstract>
</{root}>
"#
    )
}

fn in_memory_dump(name: &str, docs: &[String]) -> DumpFile {
    DumpFile::from_reader(name, Cursor::new(docs.concat().into_bytes()))
}

fn builder(patent_type: PatentType) -> IngestPipelineBuilder {
    IngestPipelineBuilder::new(patent_type)
        .with_quiet(true)
        .with_retry_policy(RetryPolicy {
            max_conflict_retries: 2,
            max_write_retries: 2,
            backoff: Duration::ZERO,
        })
}

/// Scenario 1: a grant into an empty index is written
#[test]
fn test_grant_into_empty_index() {
    let pipeline = builder(PatentType::Grant).build(MemoryStore::new()).unwrap();
    let dump = in_memory_dump(
        "ipg240116.xml",
        &[patent_xml(PatentType::Grant, "US9876543B", Some("Tiller blade"))],
    );

    let report = pipeline.ingest(dump).unwrap();
    assert_eq!(report.stats.documents_written, 1);
    assert!(report.failures.is_empty());

    let record = pipeline.store().get("US9876543B").unwrap().unwrap();
    assert_eq!(record.source["patent_type"], "grant");
    assert_eq!(record.source["pub_doc_id"], "P-US9876543B");
    assert_eq!(record.source["date_applied"], "2020-06-07");
    assert_eq!(record.source["assignees"], json!([]));
    assert_eq!(record.source["cpc_list"], json!([]));
    assert_eq!(
        record.source["abstract"],
        "A tiller blade with a <b>replaceable</b> edge."
    );
    assert_eq!(
        record.source["inventors"][0]["inventor"]["addressbook"]["last-name"],
        "Moreau"
    );
}

/// Scenario 2: an application never replaces an indexed grant
#[test]
fn test_application_skipped_when_grant_indexed() {
    let grants = builder(PatentType::Grant).build(MemoryStore::new()).unwrap();
    grants
        .ingest(in_memory_dump(
            "ipg.xml",
            &[patent_xml(PatentType::Grant, "US9876543B", Some("Granted"))],
        ))
        .unwrap();
    let before = grants.store().get("US9876543B").unwrap().unwrap();

    let applications = builder(PatentType::Application)
        .build(grants.into_store())
        .unwrap();
    let report = applications
        .ingest(in_memory_dump(
            "ipa.xml",
            &[patent_xml(PatentType::Application, "US9876543B", Some("Applied"))],
        ))
        .unwrap();

    assert_eq!(report.stats.documents_skipped, 1);
    assert_eq!(report.stats.documents_written, 0);
    let after = applications.store().get("US9876543B").unwrap().unwrap();
    assert_eq!(after, before);
    assert_eq!(after.source["invention_title"], "Granted");
}

/// Scenario 3: a grant supersedes an indexed application
#[test]
fn test_grant_supersedes_application() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = SledStore::open(temp_dir.path()).unwrap();
        let applications = builder(PatentType::Application).build(store).unwrap();
        applications
            .ingest(in_memory_dump(
                "ipa.xml",
                &[patent_xml(PatentType::Application, "US1111111A", Some("Pending"))],
            ))
            .unwrap();
        assert_eq!(
            applications.store().get("US1111111A").unwrap().unwrap().source["patent_type"],
            "application"
        );
    }

    let store = SledStore::open(temp_dir.path()).unwrap();
    let grants = builder(PatentType::Grant).build(store).unwrap();
    let report = grants
        .ingest(in_memory_dump(
            "ipg.xml",
            &[patent_xml(PatentType::Grant, "US1111111A", Some("Issued"))],
        ))
        .unwrap();

    assert_eq!(report.stats.documents_written, 1);
    let record = grants.store().get("US1111111A").unwrap().unwrap();
    assert_eq!(record.source["patent_type"], "grant");
    assert_eq!(record.source["invention_title"], "Issued");
    assert_eq!(grants.store().len(), 1);
}

/// Scenario 4: a fragment without a title is recorded and the batch goes on
#[test]
fn test_missing_title_does_not_abort_batch() {
    let pipeline = builder(PatentType::Grant).build(MemoryStore::new()).unwrap();
    let dump = in_memory_dump(
        "ipg.xml",
        &[
            patent_xml(PatentType::Grant, "US2222222B", None),
            patent_xml(PatentType::Grant, "US3333333B", Some("Complete")),
        ],
    );

    let report = pipeline.ingest(dump).unwrap();

    assert_eq!(report.stats.documents_written, 1);
    assert_eq!(report.stats.extraction_errors, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 0);
    assert_eq!(report.failures[0].stage, FailureStage::Extraction);
    assert!(report.failures[0].message.contains("invention-title"));
    assert!(pipeline.store().get("US2222222B").unwrap().is_none());
    assert!(pipeline.store().get("US3333333B").unwrap().is_some());
}

#[test]
fn test_framer_counts_fragments_in_order() {
    let ids = ["A1", "A2", "A3", "A4", "A5"];
    let docs: Vec<String> = ids
        .iter()
        .map(|id| patent_xml(PatentType::Application, id, Some("t")))
        .collect();

    let framed = frame(&docs.concat(), PatentType::Application);
    assert_eq!(framed.fragments.len(), 5);
    assert_eq!(framed.dropped, 0);
    for (fragment, id) in framed.fragments.iter().zip(ids) {
        assert!(fragment.text.contains(&format!("<doc-number>{}</doc-number>", id)));
        assert!(!fragment.text.contains("<?xml"));
        assert!(!fragment.text.contains("\n\n"));
    }

    // Grant framing ignores application documents entirely
    assert!(frame(&docs.concat(), PatentType::Grant).fragments.is_empty());
}

#[test]
fn test_bzip2_dump_from_disk_with_resume() {
    let temp_dir = TempDir::new().unwrap();
    let dump_path = temp_dir.path().join("ipa240104.xml.bz2");
    let checkpoint_path = temp_dir.path().join("ipa240104.checkpoint");

    let docs: Vec<String> = (1..=4)
        .map(|n| patent_xml(PatentType::Application, &format!("US000000{}A", n), Some("t")))
        .collect();
    let mut encoder = bzip2::write::BzEncoder::new(
        std::fs::File::create(&dump_path).unwrap(),
        bzip2::Compression::default(),
    );
    encoder.write_all(docs.concat().as_bytes()).unwrap();
    encoder.finish().unwrap();

    let store_dir = temp_dir.path().join("store");
    {
        let pipeline = builder(PatentType::Application)
            .with_max_documents(Some(3))
            .with_checkpoint(&checkpoint_path)
            .build(SledStore::open(&store_dir).unwrap())
            .unwrap();
        let report = pipeline.ingest(DumpFile::open(&dump_path).unwrap()).unwrap();
        assert_eq!(report.stats.documents_written, 3);
    }

    let checkpoint = IngestCheckpoint::load(&checkpoint_path).unwrap();
    assert_eq!(checkpoint.fragments_processed, 3);
    assert_eq!(checkpoint.source_path, dump_path);

    let pipeline = builder(PatentType::Application)
        .with_resume(checkpoint)
        .with_checkpoint(&checkpoint_path)
        .build(SledStore::open(&store_dir).unwrap())
        .unwrap();
    let report = pipeline.ingest(DumpFile::open(&dump_path).unwrap()).unwrap();

    assert_eq!(report.stats.fragments_resumed, 3);
    assert_eq!(report.stats.documents_written, 1);
    assert_eq!(pipeline.store().len(), 4);
    assert_eq!(
        IngestCheckpoint::load(&checkpoint_path).unwrap().documents_written,
        4
    );
}
