use webdav_client_rs::webdav::request;
use webdav_client_rs::{
    DavError, Depth, LockScope, LockTimeout, NamespaceTable, PropertyKey, PropertyValue,
    escape_xml,
};

fn body_string(desc: &webdav_client_rs::RequestDescriptor) -> String {
    String::from_utf8(desc.body.as_ref().expect("body present").to_vec()).expect("utf-8 body")
}

#[test]
fn propfind_lists_exactly_the_requested_properties() {
    let props = [
        PropertyKey::dav("displayname"),
        PropertyKey::dav("getetag"),
        PropertyKey::new("urn:example:notes", "notedata"),
    ];
    let desc = request::propfind("/files/", Some(&props), Depth::One, &NamespaceTable::new())
        .expect("propfind builds");
    assert_eq!(desc.method.as_str(), "PROPFIND");

    let body = body_string(&desc);
    assert_eq!(body.matches("<D:displayname/>").count(), 1);
    assert_eq!(body.matches("<D:getetag/>").count(), 1);
    assert_eq!(body.matches("<ns0:notedata/>").count(), 1);
    assert!(!body.contains("allprop"));
    assert!(body.contains(r#"xmlns:D="DAV:""#));
    assert!(body.contains(r#"xmlns:ns0="urn:example:notes""#));
}

#[test]
fn propfind_uses_registered_abbreviations() {
    let mut table = NamespaceTable::new();
    table.register("N", "urn:example:notes").expect("register");
    let props = [PropertyKey::new("urn:example:notes", "notedata")];
    let desc = request::propfind("/files/", Some(&props), Depth::Zero, &table).expect("builds");

    let body = body_string(&desc);
    assert!(body.contains("<N:notedata/>"));
    assert!(body.contains(r#"xmlns:N="urn:example:notes""#));
    assert!(!body.contains("ns0"));
}

#[test]
fn propfind_without_properties_requests_allprop() {
    let desc =
        request::propfind("/files/", None, Depth::One, &NamespaceTable::new()).expect("builds");
    let body = body_string(&desc);
    assert!(body.contains("<D:allprop/>"));
    assert!(!body.contains("<D:prop>"));
}

#[test]
fn propfind_rejects_empty_inputs() {
    let table = NamespaceTable::new();
    assert!(matches!(
        request::propfind("", None, Depth::One, &table),
        Err(DavError::InvalidRequest(_))
    ));
    assert!(matches!(
        request::propfind("/files/", Some(&[]), Depth::One, &table),
        Err(DavError::InvalidRequest(_))
    ));
}

#[test]
fn depth_header_uses_only_the_protocol_literals() {
    let table = NamespaceTable::new();
    for (depth, literal) in [
        (Depth::Zero, "0"),
        (Depth::One, "1"),
        (Depth::Infinity, "infinity"),
    ] {
        let desc = request::propfind("/files/", None, depth, &table).expect("builds");
        assert_eq!(
            desc.headers.get("Depth").expect("depth header"),
            literal,
            "unexpected Depth literal"
        );
    }
}

#[test]
fn proppatch_requires_something_to_do() {
    let err = request::proppatch("/files/a.txt", &[], &[], &NamespaceTable::new()).unwrap_err();
    assert!(matches!(err, DavError::InvalidRequest(_)));
}

#[test]
fn proppatch_builds_set_and_remove_blocks() {
    let set = [(
        PropertyKey::dav("displayname"),
        PropertyValue::Text("Q1 & Q2".to_string()),
    )];
    let remove = [PropertyKey::dav("getcontentlanguage")];
    let desc =
        request::proppatch("/files/a.txt", &set, &remove, &NamespaceTable::new()).expect("builds");
    assert_eq!(desc.method.as_str(), "PROPPATCH");

    let body = body_string(&desc);
    assert!(body.contains("<D:propertyupdate"));
    assert!(body.contains("<D:set><D:prop><D:displayname>Q1 &amp; Q2</D:displayname></D:prop></D:set>"));
    assert!(body.contains("<D:remove><D:prop><D:getcontentlanguage/></D:prop></D:remove>"));
}

#[test]
fn proppatch_renders_fragment_values_verbatim() {
    let set = [(
        PropertyKey::new("urn:example:notes", "notedata"),
        PropertyValue::Fragment("<note>remember</note>".to_string()),
    )];
    let desc = request::proppatch("/a", &set, &[], &NamespaceTable::new()).expect("builds");
    assert!(body_string(&desc).contains("<ns0:notedata><note>remember</note></ns0:notedata>"));
}

#[test]
fn mkcol_has_no_body() {
    let desc = request::mkcol("/files/new-dir/").expect("builds");
    assert_eq!(desc.method.as_str(), "MKCOL");
    assert!(desc.body.is_none());
}

#[test]
fn put_defaults_content_type_to_octet_stream() {
    let desc = request::put("/files/a.bin", bytes::Bytes::from_static(b"abc"), None)
        .expect("builds");
    assert_eq!(
        desc.headers.get("content-type").expect("content type"),
        "application/octet-stream"
    );
    assert_eq!(desc.body.as_deref(), Some(&b"abc"[..]));

    let desc = request::put(
        "/files/a.txt",
        bytes::Bytes::from_static(b"abc"),
        Some("text/plain"),
    )
    .expect("builds");
    assert_eq!(desc.headers.get("content-type").expect("content type"), "text/plain");
}

#[test]
fn copy_and_move_carry_destination_overwrite_and_condition() {
    let desc = request::copy(
        "/files/a.txt",
        "https://dav.example.com/files/b.txt",
        true,
        None,
    )
    .expect("builds");
    assert_eq!(desc.method.as_str(), "COPY");
    assert_eq!(
        desc.headers.get("Destination").expect("destination"),
        "https://dav.example.com/files/b.txt"
    );
    assert_eq!(desc.headers.get("Overwrite").expect("overwrite"), "T");
    assert!(desc.headers.get("If").is_none());
    assert!(desc.body.is_none());

    let desc = request::r#move(
        "/files/a.txt",
        "https://dav.example.com/files/b.txt",
        false,
        Some("(<urn:uuid:tok>)"),
    )
    .expect("builds");
    assert_eq!(desc.method.as_str(), "MOVE");
    assert_eq!(desc.headers.get("Overwrite").expect("overwrite"), "F");
    assert_eq!(desc.headers.get("If").expect("if header"), "(<urn:uuid:tok>)");
}

#[test]
fn copy_rejects_empty_destination() {
    let err = request::copy("/files/a.txt", "  ", true, None).unwrap_err();
    assert!(matches!(err, DavError::InvalidRequest(_)));
}

#[test]
fn lock_builds_lockinfo_body_and_timeout_header() {
    let desc = request::lock(
        "/files/a.txt",
        LockScope::Exclusive,
        "https://example.com/users/me",
        LockTimeout::Seconds(3600),
        Depth::Zero,
        &NamespaceTable::new(),
    )
    .expect("builds");
    assert_eq!(desc.method.as_str(), "LOCK");
    assert_eq!(desc.headers.get("Timeout").expect("timeout"), "Second-3600");
    assert_eq!(desc.headers.get("Depth").expect("depth"), "0");

    let body = body_string(&desc);
    assert!(body.contains("<D:lockscope><D:exclusive/></D:lockscope>"));
    assert!(body.contains("<D:locktype><D:write/></D:locktype>"));
    assert!(body.contains("<D:owner><D:href>https://example.com/users/me</D:href></D:owner>"));
}

#[test]
fn lock_normalizes_depth_one_and_formats_infinite_timeout() {
    let desc = request::lock(
        "/files/",
        LockScope::Shared,
        "https://example.com/users/me",
        LockTimeout::Infinite,
        Depth::One,
        &NamespaceTable::new(),
    )
    .expect("builds");
    // RFC 4918 only allows 0 or infinity on LOCK.
    assert_eq!(desc.headers.get("Depth").expect("depth"), "0");
    assert_eq!(desc.headers.get("Timeout").expect("timeout"), "Infinite");
    assert!(body_string(&desc).contains("<D:lockscope><D:shared/></D:lockscope>"));
}

#[test]
fn lock_rejects_empty_owner() {
    let err = request::lock(
        "/files/a.txt",
        LockScope::Exclusive,
        "",
        LockTimeout::Infinite,
        Depth::Zero,
        &NamespaceTable::new(),
    )
    .unwrap_err();
    assert!(matches!(err, DavError::InvalidRequest(_)));
}

#[test]
fn unlock_wraps_the_token_in_angle_brackets_once() {
    let desc = request::unlock("/files/a.txt", "urn:uuid:tok-1").expect("builds");
    assert_eq!(desc.method.as_str(), "UNLOCK");
    assert_eq!(
        desc.headers.get("Lock-Token").expect("lock token"),
        "<urn:uuid:tok-1>"
    );
    assert!(desc.body.is_none());

    let desc = request::unlock("/files/a.txt", "<urn:uuid:tok-1>").expect("builds");
    assert_eq!(
        desc.headers.get("Lock-Token").expect("lock token"),
        "<urn:uuid:tok-1>"
    );
}

#[test]
fn report_wraps_props_and_hrefs_in_the_vendor_root() {
    let root = PropertyKey::new("urn:example:reports", "item-report");
    let props = [PropertyKey::dav("getetag")];
    let hrefs = ["/files/a.txt".to_string(), "/files/b.txt".to_string()];
    let desc = request::report(
        "/files/",
        &root,
        &props,
        &hrefs,
        Depth::One,
        &NamespaceTable::new(),
    )
    .expect("builds");
    assert_eq!(desc.method.as_str(), "REPORT");
    assert_eq!(desc.headers.get("Depth").expect("depth"), "1");

    let body = body_string(&desc);
    assert!(body.starts_with(r#"<?xml version="1.0" encoding="utf-8"?><ns0:item-report"#));
    assert!(body.contains(r#"xmlns:ns0="urn:example:reports""#));
    assert!(body.contains("<D:prop><D:getetag/></D:prop>"));
    assert!(body.contains("<D:href>/files/a.txt</D:href><D:href>/files/b.txt</D:href>"));
    assert!(body.ends_with("</ns0:item-report>"));
}

#[test]
fn namespace_table_enforces_unique_non_empty_entries() {
    let mut table = NamespaceTable::new();
    assert!(table.register("C", "urn:ietf:params:xml:ns:caldav").is_ok());
    assert!(matches!(
        table.register("C", "urn:example:other"),
        Err(DavError::InvalidRequest(_))
    ));
    assert!(matches!(
        table.register("X", "urn:ietf:params:xml:ns:caldav"),
        Err(DavError::InvalidRequest(_))
    ));
    assert!(matches!(
        table.register("", "urn:example:other"),
        Err(DavError::InvalidRequest(_))
    ));
    assert_eq!(table.abbreviation_for("DAV:"), Some("D"));
}

#[test]
fn escape_xml_handles_the_special_characters() {
    assert_eq!(escape_xml("a&b<c>\"d'"), "a&amp;b&lt;c&gt;&quot;d&apos;");
    assert_eq!(escape_xml("plain"), "plain");
}
