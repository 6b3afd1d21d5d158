use loader::{DataSource, FsHttpDataSource};
use shared::domain::{InputFormat, SourceRef};

async fn load(
    source: &dyn DataSource,
    format: InputFormat,
    reference: &SourceRef,
) -> anyhow::Result<shared::domain::RawDataset> {
    match format {
        InputFormat::Tabular => source.fetch_tabular(reference).await,
        InputFormat::RemoteJson => source.fetch_remote_revision(reference).await,
        InputFormat::InlineJson => source.parse_inline(reference).await,
    }
}

#[tokio::test]
async fn trait_object_dispatch_covers_local_formats() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("acceptance.csv"),
        "id,title,readers,area\n1,one,10,A\n2,two,20,B\n3,three,30,A\n",
    )
    .expect("write csv");

    let source = FsHttpDataSource::new(dir.path(), "http://127.0.0.1:9/unused");
    let source: &dyn DataSource = &source;

    let tabular = load(
        source,
        InputFormat::Tabular,
        &SourceRef::new("vis/data/acceptance.csv"),
    )
    .await
    .expect("tabular");
    assert_eq!(tabular.paper_count(), 3);
    assert_eq!(tabular.area_names(), vec!["A", "B"]);

    let inline = load(
        source,
        InputFormat::InlineJson,
        &SourceRef::new(r#"[{"id": 9, "title": "inline", "area": "C"}]"#),
    )
    .await
    .expect("inline");
    assert_eq!(inline.paper_count(), 1);
    assert_eq!(inline.papers[0].id, "9");

    let parse_failure = load(source, InputFormat::InlineJson, &SourceRef::new("not json")).await;
    assert!(parse_failure.is_err());
}
