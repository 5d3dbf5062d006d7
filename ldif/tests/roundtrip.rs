use std::collections::BTreeMap;
use std::io::{self, BufReader, Cursor, Read, Write};

use ldif::{
    Attribute, Body, Change, ChangeType, LdifError, LdifParser, LdifWriter, ModOp,
    ParserConfig, Record, Strictness, WriterConfig,
};
use proptest::prelude::*;

fn parse_all(data: &[u8]) -> Vec<Record> {
    LdifParser::new(Cursor::new(data))
        .collect::<ldif::Result<Vec<_>>>()
        .unwrap()
}

fn write_all(config: WriterConfig, records: &[(String, Body)]) -> Vec<u8> {
    let mut w = LdifWriter::with_config(Vec::new(), config).unwrap();
    for (dn, body) in records {
        w.unparse(dn, body).unwrap();
    }
    assert_eq!(w.records_written(), records.len() as u64);
    w.into_inner()
}

fn sorted(mut attrs: Vec<Attribute>) -> Vec<Attribute> {
    attrs.sort_by(|a, b| a.ad.cmp(&b.ad));
    attrs
}

/// Reader that fails every read, to prove nothing is read ahead.
struct Exploding;

impl Read for Exploding {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("read past the requested record"))
    }
}

// ── Group 1: documented examples ───────────────────────────────────

#[test]
fn parse_mail_record() {
    let records = parse_all(b"dn: mail=foo@example.org\nmail: foo@example.org\nobjectclass: top\n\n");
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.dn.as_deref(), Some("mail=foo@example.org"));
    assert_eq!(r.changetype, None);
    assert_eq!(
        r.attributes,
        vec![
            Attribute::with_values("mail", ["foo@example.org"]),
            Attribute::with_values("objectclass", ["top"]),
        ]
    );
}

#[test]
fn write_entry_record() {
    let out = write_all(
        WriterConfig::new(),
        &[(
            "cn=A,dc=x".to_string(),
            Body::Entry(vec![Attribute::with_values("cn", ["A"])]),
        )],
    );
    assert_eq!(out, b"dn: cn=A,dc=x\ncn: A\n\n");
}

#[test]
fn write_replace_record() {
    let out = write_all(
        WriterConfig::new(),
        &[(
            "cn=A,dc=x".to_string(),
            Body::Changes(vec![Change::modify(
                ModOp::from_code(2).unwrap(),
                "mail",
                ["new@example.org"],
            )]),
        )],
    );
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "dn: cn=A,dc=x\nchangetype: modify\nreplace: mail\nmail: new@example.org\n-\n\n"
    );
}

#[test]
fn write_then_parse_change_records() {
    let out = write_all(
        WriterConfig::new(),
        &[
            (
                "cn=A,dc=x".to_string(),
                Body::Changes(vec![Change::add("cn", ["A"]), Change::add("sn", ["B"])]),
            ),
            ("cn=B,dc=x".to_string(), Body::Delete),
            (
                "cn=C,dc=x".to_string(),
                Body::ModRdn {
                    newrdn: "cn=D".to_string(),
                    deleteoldrdn: false,
                    newsuperior: None,
                },
            ),
        ],
    );
    let records = parse_all(&out);
    let types: Vec<Option<ChangeType>> = records.iter().map(|r| r.changetype).collect();
    assert_eq!(
        types,
        vec![
            Some(ChangeType::Add),
            Some(ChangeType::Delete),
            Some(ChangeType::ModRdn)
        ]
    );
    assert_eq!(records[2].values("newrdn"), &[b"cn=D".to_vec()]);
    assert_eq!(records[2].values("deleteoldrdn"), &[b"0".to_vec()]);
}

#[test]
fn comments_never_contribute() {
    let records = parse_all(b"# cn: hidden\ndn: cn=a\n# mail: hidden\n  still hidden\ncn: a\n");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attributes, vec![Attribute::with_values("cn", ["a"])]);
}

#[test]
fn crlf_input() {
    let records = parse_all(b"dn: cn=a,\r\n dc=x\r\ncn: a\r\n\r\ndn: cn=b\r\n");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].dn.as_deref(), Some("cn=a,dc=x"));
    assert_eq!(records[1].dn.as_deref(), Some("cn=b"));
}

#[test]
fn binary_values_survive() {
    let value: Vec<u8> = (0u8..=255).collect();
    let out = write_all(
        WriterConfig::new(),
        &[(
            "cn=bin".to_string(),
            Body::Entry(vec![Attribute::with_values("jpegPhoto", [value.clone()])]),
        )],
    );
    let records = parse_all(&out);
    assert_eq!(records[0].values("jpegPhoto"), &[value]);
}

// ── Group 2: URL values ─────────────────────────────────────────────

#[test]
fn file_url_dereferenced() {
    let mut photo = tempfile::NamedTempFile::new().unwrap();
    photo.write_all(b"\xff\xd8\xff\xe0").unwrap();
    let url = url::Url::from_file_path(photo.path()).unwrap();
    let input = format!("dn: cn=a\njpegPhoto:< {}\n", url);

    let records: Vec<Record> = LdifParser::with_config(
        Cursor::new(input.as_bytes()),
        ParserConfig::new().allow_url_scheme("file"),
    )
    .map(|r| r.unwrap())
    .collect();
    assert_eq!(records[0].values("jpegPhoto"), &[b"\xff\xd8\xff\xe0".to_vec()]);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::from_file_path(dir.path().join("gone.jpg")).unwrap();
    let input = format!("dn: cn=a\njpegPhoto:< {}\n", url);

    let mut parser = LdifParser::with_config(
        Cursor::new(input.as_bytes()),
        ParserConfig::new()
            .allow_url_scheme("file")
            .strictness(Strictness::Lenient),
    );
    match parser.next() {
        Some(Err(LdifError::Io(e))) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
        other => panic!("expected I/O error, got {:?}", other),
    }
}

// ── Group 3: laziness ───────────────────────────────────────────────

#[test]
fn records_are_read_on_demand() {
    let head = Cursor::new(&b"dn: cn=a\ncn: a\n\ndn: cn=b\ncn: b\n"[..]);
    let mut parser = LdifParser::new(BufReader::new(head.chain(Exploding)));

    let first = parser.next().unwrap().unwrap();
    assert_eq!(first.dn.as_deref(), Some("cn=a"));
    assert!(matches!(parser.next(), Some(Err(LdifError::Io(_)))));
    assert!(parser.next().is_none());
}

// ── Group 4: round trip ─────────────────────────────────────────────

fn attr_type() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9-]{0,12}".prop_filter("reserved attribute type", |t| {
        !matches!(t.as_str(), "dn" | "changetype" | "version")
    })
}

fn entry() -> impl Strategy<Value = (String, BTreeMap<String, Vec<Vec<u8>>>)> {
    (
        "cn=[a-z]{1,8}(,dc=[a-z]{1,8}){0,3}",
        prop::collection::btree_map(
            attr_type(),
            prop::collection::vec(prop::collection::vec(any::<u8>(), 0..40), 1..4),
            1..6,
        ),
    )
}

proptest! {
    #[test]
    fn parse_write_round_trip(
        entries in prop::collection::vec(entry(), 1..5),
        cols in 2usize..100,
    ) {
        let records: Vec<(String, Body)> = entries
            .iter()
            .map(|(dn, attrs)| {
                let attrs = attrs
                    .iter()
                    .map(|(ad, values)| Attribute { ad: ad.clone(), values: values.clone() })
                    .collect();
                (dn.clone(), Body::Entry(attrs))
            })
            .collect();

        let out = write_all(WriterConfig::new().cols(cols), &records);
        let parsed = parse_all(&out);

        prop_assert_eq!(parsed.len(), records.len());
        for (record, (dn, body)) in parsed.into_iter().zip(records) {
            prop_assert_eq!(record.dn, Some(dn));
            prop_assert_eq!(record.changetype, None);
            match body {
                Body::Entry(attrs) => prop_assert_eq!(sorted(record.attributes), sorted(attrs)),
                _ => unreachable!(),
            }
        }
    }
}
