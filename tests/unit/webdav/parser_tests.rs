use webdav_client_rs::{
    DavError, PropertyKey, PropertyValue, parse_lockdiscovery, parse_multistatus_bytes,
    parse_multistatus_bytes_visit,
};

#[test]
fn parse_preserves_document_order() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/a</D:href>
    <D:propstat>
      <D:prop><D:getetag>"1"</D:getetag></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/c</D:href>
    <D:propstat>
      <D:prop><D:getetag>"2"</D:getetag></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/b</D:href>
    <D:propstat>
      <D:prop><D:getetag>"3"</D:getetag></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

    let records = parse_multistatus_bytes(xml.as_bytes()).expect("parses");
    let hrefs: Vec<&str> = records.iter().map(|r| r.href.as_str()).collect();
    assert_eq!(hrefs, vec!["/a", "/c", "/b"]);
}

#[test]
fn propstat_status_partitions_properties() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/files/</D:href>
    <D:propstat>
      <D:prop><D:displayname>Files</D:displayname></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
    <D:propstat>
      <D:prop><D:quota-used-bytes/></D:prop>
      <D:status>HTTP/1.1 404 Not Found</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

    let records = parse_multistatus_bytes(xml.as_bytes()).expect("parses");
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.display_name(), Some("Files"));
    assert!(record.properties.contains_key(&PropertyKey::dav("displayname")));
    assert!(!record.properties.contains_key(&PropertyKey::dav("quota-used-bytes")));
    assert_eq!(
        record.failed_properties.get(&PropertyKey::dav("quota-used-bytes")),
        Some(&404)
    );
    assert!(!record.failed_properties.contains_key(&PropertyKey::dav("displayname")));
}

#[test]
fn resourcetype_collection_sets_is_collection() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/dir/</D:href>
    <D:propstat>
      <D:prop>
        <D:resourcetype><D:collection/></D:resourcetype>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/dir/file.txt</D:href>
    <D:propstat>
      <D:prop>
        <D:resourcetype/>
        <D:getcontentlength>1024</D:getcontentlength>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

    let records = parse_multistatus_bytes(xml.as_bytes()).expect("parses");
    assert_eq!(records.len(), 2);
    assert!(records[0].is_collection);
    assert!(!records[1].is_collection);
    assert_eq!(records[1].content_length(), Some(1024));
}

#[test]
fn unknown_properties_are_preserved_as_raw_fragments() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:" xmlns:Z="urn:example:notes">
  <D:response>
    <D:href>/notes/1</D:href>
    <D:propstat>
      <D:prop>
        <Z:notedata><Z:note author="me">remember</Z:note></Z:notedata>
        <Z:deleted/>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

    let records = parse_multistatus_bytes(xml.as_bytes()).expect("parses");
    let record = &records[0];

    let notedata = record
        .properties
        .get(&PropertyKey::new("urn:example:notes", "notedata"))
        .expect("notedata preserved");
    match notedata {
        PropertyValue::Fragment(raw) => {
            assert!(raw.contains(r#"<Z:note author="me">"#));
            assert!(raw.contains("remember"));
        }
        other => panic!("expected raw fragment, got {other:?}"),
    }

    assert_eq!(
        record
            .properties
            .get(&PropertyKey::new("urn:example:notes", "deleted")),
        Some(&PropertyValue::Empty)
    );
}

#[test]
fn default_namespace_documents_resolve_without_prefixes() {
    // SharePoint-style: everything in the default namespace.
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<multistatus xmlns="DAV:">
  <response>
    <href>/shared/doc.txt</href>
    <propstat>
      <prop>
        <displayname>Doc</displayname>
        <resourcetype/>
      </prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
</multistatus>"#;

    let records = parse_multistatus_bytes(xml.as_bytes()).expect("parses");
    let record = &records[0];
    assert_eq!(record.href, "/shared/doc.txt");
    assert_eq!(record.display_name(), Some("Doc"));
    assert!(!record.is_collection);
}

#[test]
fn vendor_prefix_for_dav_namespace_still_resolves() {
    // Some servers bind DAV: to an arbitrary prefix.
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<lp1:multistatus xmlns:lp1="DAV:">
  <lp1:response>
    <lp1:href>/x/</lp1:href>
    <lp1:propstat>
      <lp1:prop>
        <lp1:resourcetype><lp1:collection/></lp1:resourcetype>
      </lp1:prop>
      <lp1:status>HTTP/1.1 200 OK</lp1:status>
    </lp1:propstat>
  </lp1:response>
</lp1:multistatus>"#;

    let records = parse_multistatus_bytes(xml.as_bytes()).expect("parses");
    assert!(records[0].is_collection);
    assert!(records[0]
        .properties
        .contains_key(&PropertyKey::dav("resourcetype")));
}

#[test]
fn duplicate_hrefs_keep_the_first_record() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/same</D:href>
    <D:propstat>
      <D:prop><D:displayname>first</D:displayname></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/same</D:href>
    <D:propstat>
      <D:prop><D:displayname>second</D:displayname></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

    let records = parse_multistatus_bytes(xml.as_bytes()).expect("parse still succeeds");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].display_name(), Some("first"));
}

#[test]
fn response_without_href_is_malformed() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:propstat>
      <D:prop><D:displayname>orphan</D:displayname></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

    let err = parse_multistatus_bytes(xml.as_bytes()).unwrap_err();
    assert!(matches!(err, DavError::MalformedResponse(_)));
}

#[test]
fn unparsable_xml_is_malformed_not_empty() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response></D:propstat></D:response>
</D:multistatus>"#;

    let err = parse_multistatus_bytes(xml.as_bytes()).unwrap_err();
    assert!(matches!(err, DavError::MalformedResponse(_)));
}

#[test]
fn document_without_multistatus_root_is_malformed() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?><D:prop xmlns:D="DAV:"/>"#;
    let err = parse_multistatus_bytes(xml.as_bytes()).unwrap_err();
    assert!(matches!(err, DavError::MalformedResponse(_)));
}

#[test]
fn response_level_status_is_recorded() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/gone</D:href>
    <D:status>HTTP/1.1 404 Not Found</D:status>
  </D:response>
</D:multistatus>"#;

    let records = parse_multistatus_bytes(xml.as_bytes()).expect("parses");
    assert_eq!(records[0].status.as_deref(), Some("HTTP/1.1 404 Not Found"));
    assert!(records[0].properties.is_empty());
}

#[test]
fn escaped_text_is_decoded_in_property_values() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/x</D:href>
    <D:propstat>
      <D:prop><D:displayname>A &amp; B</D:displayname></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

    let records = parse_multistatus_bytes(xml.as_bytes()).expect("parses");
    assert_eq!(records[0].display_name(), Some("A & B"));
}

#[test]
fn visit_callback_sees_records_in_order() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response><D:href>/1</D:href><D:status>HTTP/1.1 200 OK</D:status></D:response>
  <D:response><D:href>/2</D:href><D:status>HTTP/1.1 200 OK</D:status></D:response>
</D:multistatus>"#;

    let mut hrefs = Vec::new();
    parse_multistatus_bytes_visit(xml.as_bytes(), |record| {
        hrefs.push(record.href);
        Ok(())
    })
    .expect("parses");
    assert_eq!(hrefs, vec!["/1", "/2"]);
}

#[test]
fn lockdiscovery_extracts_token_and_timeout() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<D:prop xmlns:D="DAV:">
  <D:lockdiscovery>
    <D:activelock>
      <D:locktype><D:write/></D:locktype>
      <D:lockscope><D:exclusive/></D:lockscope>
      <D:depth>infinity</D:depth>
      <D:owner><D:href>http://example.org/~ejw/contact.html</D:href></D:owner>
      <D:timeout>Second-604800</D:timeout>
      <D:locktoken>
        <D:href>urn:uuid:e71d4fae-5dec-22d6-fea5-00a0c91e6be4</D:href>
      </D:locktoken>
    </D:activelock>
  </D:lockdiscovery>
</D:prop>"#;

    let discovery = parse_lockdiscovery(xml.as_bytes())
        .expect("parses")
        .expect("token present");
    assert_eq!(discovery.token, "urn:uuid:e71d4fae-5dec-22d6-fea5-00a0c91e6be4");
    assert_eq!(
        discovery.timeout,
        Some(webdav_client_rs::LockTimeout::Seconds(604800))
    );
}

#[test]
fn lockdiscovery_without_token_yields_none() {
    let xml = r#"<?xml version="1.0"?><D:prop xmlns:D="DAV:"><D:lockdiscovery/></D:prop>"#;
    assert!(parse_lockdiscovery(xml.as_bytes()).expect("parses").is_none());
}
