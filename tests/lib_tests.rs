use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tagsweep::engine::{path_relative_to, path_to_remote_string};
use tagsweep::storage::auth::{
    SharedKeyCredential, SignableRequest, canonicalized_headers, canonicalized_resource,
    string_to_sign,
};
use tagsweep::storage::xml::{parse_find_page, tags_body, xml_escape, xml_unescape};
use tagsweep::storage::{AzureBlobClient, AzureBlobConfig, Error, TagQuery};
use tagsweep::utils::config::DataFiles;
use tagsweep::utils::{Settings, SettingsOverrides, load_settings};
use tagsweep::{BlobRef, Operation, RunState, Tags};
use url::Url;

// --- BlobRef / Operation / RunState ---

#[test]
fn test_blob_ref_renders_as_line() {
    let b = BlobRef::new("photos", "2024/jan/cat.jpg");
    assert_eq!(b.to_string(), "/photos/2024/jan/cat.jpg");
}

#[test]
fn test_operation_parse_case_insensitive() {
    assert_eq!("export".parse::<Operation>().unwrap(), Operation::Export);
    assert_eq!(" SET ".parse::<Operation>().unwrap(), Operation::Set);
}

#[test]
fn test_operation_parse_unknown() {
    let err = "delete".parse::<Operation>().unwrap_err();
    assert!(err.to_string().contains("Unknown operation 'delete'"));
}

#[test]
fn test_run_state_finish() {
    assert_eq!(RunState::default(), RunState::Idle);
    assert_eq!(RunState::finish(false), RunState::Completed);
    assert_eq!(RunState::finish(true), RunState::Aborted);
    assert!(RunState::Aborted.is_terminal());
    assert!(!RunState::Running.is_terminal());
}

// --- DataFiles naming ---

#[test]
fn test_data_file_name() {
    assert_eq!(DataFiles::file_name("data", 1), "data-1.txt");
    assert_eq!(DataFiles::file_name("blobs", 42), "blobs-42.txt");
}

#[test]
fn test_data_file_index_of() {
    assert_eq!(DataFiles::index_of("data", "data-1.txt"), Some(1));
    assert_eq!(DataFiles::index_of("data", "data-120.txt"), Some(120));
    assert_eq!(DataFiles::index_of("data", "data-x.txt"), None);
    assert_eq!(DataFiles::index_of("data", "data-1.csv"), None);
    assert_eq!(DataFiles::index_of("data", "other-1.txt"), None);
    assert_eq!(DataFiles::index_of("data", "data1.txt"), None);
}

// --- path helpers ---

#[test]
fn test_path_relative_under_base() {
    let base = PathBuf::from("/foo/bar");
    let path = PathBuf::from("/foo/bar/baz/qux");
    assert_eq!(
        path_relative_to(&path, &base),
        Some(PathBuf::from("baz/qux"))
    );
}

#[test]
fn test_path_relative_not_under_base() {
    let base = PathBuf::from("/foo/bar");
    let path = PathBuf::from("/other/qux");
    assert_eq!(path_relative_to(&path, &base), None);
}

#[test]
fn test_path_to_remote_string() {
    assert_eq!(path_to_remote_string(Path::new("a/b/c")), "a/b/c");
    assert_eq!(path_to_remote_string(Path::new("./a/b")), "a/b");
    assert_eq!(path_to_remote_string(Path::new("")), "");
}

// --- xml ---

#[test]
fn test_xml_escape_unescape() {
    let raw = r#"a&b <c> "d" 'e'"#;
    let escaped = xml_escape(raw);
    assert_eq!(escaped, "a&amp;b &lt;c&gt; &quot;d&quot; &apos;e&apos;");
    assert_eq!(xml_unescape(&escaped), raw);
}

#[test]
fn test_xml_unescape_numeric_and_unknown() {
    assert_eq!(xml_unescape("caf&#233; &#x41;"), "café A");
    assert_eq!(xml_unescape("&bogus; & done"), "&bogus; & done");
}

#[test]
fn test_parse_find_page_account_scope() {
    let body = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://acct.blob.core.windows.net/">
  <Where>"project" = 'alpha'</Where>
  <Blobs>
    <Blob>
      <Name>2024/a&amp;b.txt</Name>
      <ContainerName>docs</ContainerName>
      <Tags><TagSet><Tag><Key>project</Key><Value>alpha</Value></Tag></TagSet></Tags>
    </Blob>
    <Blob>
      <Name>img.png</Name>
      <ContainerName>media</ContainerName>
    </Blob>
  </Blobs>
  <NextMarker>2!72!MDAwMDQ3</NextMarker>
</EnumerationResults>"#;
    let page = parse_find_page(body, None).unwrap();
    assert_eq!(
        page.blobs,
        vec![
            BlobRef::new("docs", "2024/a&b.txt"),
            BlobRef::new("media", "img.png"),
        ]
    );
    assert_eq!(page.next_marker.as_deref(), Some("2!72!MDAwMDQ3"));
}

#[test]
fn test_parse_find_page_last_page() {
    let body = r#"<EnumerationResults><Blobs /><NextMarker /></EnumerationResults>"#;
    let page = parse_find_page(body, None).unwrap();
    assert!(page.blobs.is_empty());
    assert_eq!(page.next_marker, None);
}

#[test]
fn test_parse_find_page_container_fallback() {
    let body = "<EnumerationResults><Blobs><Blob><Name>x.bin</Name></Blob></Blobs><NextMarker></NextMarker></EnumerationResults>";
    let page = parse_find_page(body, Some("archive")).unwrap();
    assert_eq!(page.blobs, vec![BlobRef::new("archive", "x.bin")]);
    assert!(parse_find_page(body, None).is_err());
}

#[test]
fn test_parse_find_page_rejects_other_documents() {
    let body = "<Error><Code>AuthenticationFailed</Code></Error>";
    assert!(matches!(parse_find_page(body, None), Err(Error::Xml(_))));
}

#[test]
fn test_tags_body() {
    let mut tags = Tags::new();
    tags.insert("tier".to_string(), "cold".to_string());
    tags.insert("owner".to_string(), "a&b".to_string());
    assert_eq!(
        tags_body(&tags),
        "<?xml version=\"1.0\" encoding=\"utf-8\"?><Tags><TagSet>\
         <Tag><Key>owner</Key><Value>a&amp;b</Value></Tag>\
         <Tag><Key>tier</Key><Value>cold</Value></Tag>\
         </TagSet></Tags>"
    );
}

#[test]
fn test_tags_body_empty_clears() {
    assert_eq!(
        tags_body(&Tags::new()),
        "<?xml version=\"1.0\" encoding=\"utf-8\"?><Tags><TagSet></TagSet></Tags>"
    );
}

// --- Shared Key signing ---

fn ms_headers() -> BTreeMap<String, String> {
    let mut h = BTreeMap::new();
    h.insert(
        "x-ms-date".to_string(),
        "Mon, 01 Jan 2024 00:00:00 GMT".to_string(),
    );
    h.insert("x-ms-version".to_string(), "2021-12-02".to_string());
    h
}

#[test]
fn test_canonicalized_headers() {
    assert_eq!(
        canonicalized_headers(&ms_headers()),
        "x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\nx-ms-version:2021-12-02\n"
    );
}

#[test]
fn test_canonicalized_resource_sorts_and_decodes() {
    let url = Url::parse(
        "https://acct.blob.core.windows.net/docs?restype=container&comp=blobs&where=%22a%22%3D%27b%27",
    )
    .unwrap();
    assert_eq!(
        canonicalized_resource(&url, "acct"),
        "/acct/docs\ncomp:blobs\nrestype:container\nwhere:\"a\"='b'"
    );
}

#[test]
fn test_string_to_sign_get() {
    let url = Url::parse("https://acct.blob.core.windows.net/?comp=blobs&where=x").unwrap();
    let headers = ms_headers();
    let req = SignableRequest {
        method: "GET",
        url: &url,
        content_length: 0,
        content_type: None,
        ms_headers: &headers,
    };
    let expected = format!(
        "GET{}x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\nx-ms-version:2021-12-02\n/acct/\ncomp:blobs\nwhere:x",
        "\n".repeat(12)
    );
    assert_eq!(string_to_sign(&req, "acct"), expected);
}

#[test]
fn test_string_to_sign_put_with_body() {
    let url = Url::parse("https://acct.blob.core.windows.net/docs/a.txt?comp=tags").unwrap();
    let headers = ms_headers();
    let req = SignableRequest {
        method: "PUT",
        url: &url,
        content_length: 120,
        content_type: Some("application/xml; charset=UTF-8"),
        ms_headers: &headers,
    };
    let s = string_to_sign(&req, "acct");
    assert!(s.starts_with("PUT\n\n\n120\n\napplication/xml; charset=UTF-8\n\n\n\n\n\n\n"));
    assert!(s.ends_with("/acct/docs/a.txt\ncomp:tags"));
}

#[test]
fn test_authorization_header_shape() {
    let cred = SharedKeyCredential::new("acct", "c2VjcmV0").unwrap();
    assert_eq!(cred.account(), "acct");
    let a = cred.sign("payload");
    assert_eq!(a, cred.sign("payload"));
    assert_ne!(a, cred.sign("payload2"));

    let url = Url::parse("https://acct.blob.core.windows.net/?comp=blobs").unwrap();
    let headers = ms_headers();
    let auth = cred.authorization(&SignableRequest {
        method: "GET",
        url: &url,
        content_length: 0,
        content_type: None,
        ms_headers: &headers,
    });
    assert!(auth.starts_with("SharedKey acct:"));
}

#[test]
fn test_invalid_key_rejected() {
    let err = SharedKeyCredential::new("acct", "not base64!!").unwrap_err();
    assert!(matches!(err, Error::InvalidKey(_)));
}

// --- Blob REST URLs ---

fn client(endpoint: Option<&str>) -> AzureBlobClient {
    AzureBlobClient::new(AzureBlobConfig {
        account: "acct".to_string(),
        key: "c2VjcmV0".to_string(),
        endpoint: endpoint.map(str::to_string),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn query_of(url: &Url) -> BTreeMap<String, String> {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[test]
fn test_find_url_account_scope() {
    let c = client(None);
    let q = TagQuery {
        filter: "\"project\" = 'alpha'".to_string(),
        container: None,
        page_size: 5000,
    };
    let url = c.find_url(&q, None).unwrap();
    assert_eq!(url.host_str(), Some("acct.blob.core.windows.net"));
    assert_eq!(url.path(), "/");
    let pairs = query_of(&url);
    assert_eq!(pairs["comp"], "blobs");
    assert_eq!(pairs["where"], "\"project\" = 'alpha'");
    assert_eq!(pairs["maxresults"], "5000");
    assert!(!pairs.contains_key("restype"));
    assert!(!pairs.contains_key("marker"));
}

#[test]
fn test_find_url_container_scope_with_marker() {
    let c = client(None);
    let q = TagQuery {
        filter: "x = 'y'".to_string(),
        container: Some("docs".to_string()),
        page_size: 10,
    };
    let url = c.find_url(&q, Some("m1")).unwrap();
    assert_eq!(url.path(), "/docs");
    let pairs = query_of(&url);
    assert_eq!(pairs["restype"], "container");
    assert_eq!(pairs["marker"], "m1");
}

#[test]
fn test_tags_url_keeps_virtual_directories() {
    let c = client(Some("http://127.0.0.1:10000/acct"));
    let url = c
        .tags_url(&BlobRef::new("docs", "2024/jan/report 1.pdf"))
        .unwrap();
    assert_eq!(url.path(), "/acct/docs/2024/jan/report%201.pdf");
    assert_eq!(url.query(), Some("comp=tags"));
}

// --- settings ---

fn write_config(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_settings_toml_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        "config.toml",
        r#"
operation = "export"
storage_name = "acct"
tag_filter = "\"project\" = 'alpha'"
folder = "out"
"#,
    );
    let cfg = load_settings(&path).unwrap().into_run_config().unwrap();
    assert_eq!(cfg.operation, Operation::Export);
    assert_eq!(cfg.account, "acct");
    assert_eq!(cfg.storage_key, None);
    assert_eq!(cfg.export.rows_per_file, 100_000);
    assert_eq!(cfg.export.page_size, 5_000);
    assert_eq!(cfg.export.queue_capacity, 10);
    assert_eq!(cfg.export.file_prefix, "data");
    assert_eq!(cfg.set.max_in_flight, 100);
    assert!(cfg.set.partitions >= 1);
    assert!(cfg.set.tags.is_empty());
    assert_eq!(cfg.set.report_interval, Duration::from_secs(5));
}

#[test]
fn test_settings_json_camel_case_aliases() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        "config.json",
        r#"{
  "operation": "set",
  "storageName": "acct",
  "storageKey": "c2VjcmV0",
  "folder": "out",
  "rowsPerFile": 50,
  "maxInFlight": 8,
  "reportIntervalSecs": 30,
  "tags": { "tier": "cold" }
}"#,
    );
    let cfg = load_settings(&path).unwrap().into_run_config().unwrap();
    assert_eq!(cfg.operation, Operation::Set);
    assert_eq!(cfg.storage_key.as_deref(), Some("c2VjcmV0"));
    assert_eq!(cfg.export.rows_per_file, 50);
    assert_eq!(cfg.set.max_in_flight, 8);
    assert_eq!(cfg.set.report_interval, Duration::from_secs(30));
    assert_eq!(cfg.set.tags.get("tier").map(String::as_str), Some("cold"));
}

#[test]
fn test_settings_missing_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_settings(&dir.path().join("nope.toml")).is_err());
}

#[test]
fn test_settings_unparsable_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "config.json", "{ not json");
    assert!(load_settings(&path).is_err());
}

fn base_settings() -> Settings {
    Settings {
        operation: Some("export".to_string()),
        storage_name: Some("acct".to_string()),
        tag_filter: Some("a = 'b'".to_string()),
        folder: Some(PathBuf::from("out")),
        ..Settings::default()
    }
}

#[test]
fn test_settings_export_requires_tag_filter() {
    let s = Settings {
        tag_filter: None,
        ..base_settings()
    };
    assert!(s.into_run_config().is_err());

    let s = Settings {
        operation: Some("set".to_string()),
        tag_filter: None,
        ..base_settings()
    };
    assert!(s.into_run_config().is_ok());
}

#[test]
fn test_settings_requires_account_and_folder() {
    let s = Settings {
        storage_name: Some("  ".to_string()),
        ..base_settings()
    };
    assert!(s.into_run_config().is_err());

    let s = Settings {
        folder: None,
        ..base_settings()
    };
    assert!(s.into_run_config().is_err());
}

#[test]
fn test_settings_rejects_zero_limits() {
    let s = Settings {
        rows_per_file: Some(0),
        ..base_settings()
    };
    assert!(s.into_run_config().is_err());

    let s = Settings {
        max_in_flight: Some(0),
        ..base_settings()
    };
    assert!(s.into_run_config().is_err());

    let s = Settings {
        page_size: Some(0),
        ..base_settings()
    };
    assert!(s.into_run_config().is_err());
}

#[test]
fn test_settings_rejects_prefix_with_separator() {
    let s = Settings {
        file_prefix: Some("../data".to_string()),
        ..base_settings()
    };
    assert!(s.into_run_config().is_err());
}

#[test]
fn test_settings_cli_overrides_win() {
    let mut s = Settings {
        rows_per_file: Some(10),
        ..base_settings()
    };
    s.apply_overrides(&SettingsOverrides {
        operation: Some(Operation::Set),
        folder: Some(PathBuf::from("elsewhere")),
        rows_per_file: Some(99),
        max_in_flight: Some(3),
        partitions: Some(2),
        verbose: Some(true),
    });
    let cfg = s.into_run_config().unwrap();
    assert_eq!(cfg.operation, Operation::Set);
    assert_eq!(cfg.set.folder, PathBuf::from("elsewhere"));
    assert_eq!(cfg.export.rows_per_file, 99);
    assert_eq!(cfg.set.max_in_flight, 3);
    assert_eq!(cfg.set.partitions, 2);
    assert!(cfg.verbose);
}
