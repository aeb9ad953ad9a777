use std::fs;
use std::path::Path;

use rpm_format::fixture::PackageBuilder;
use rpm_format::header::{tags, Value};
use rpm_format::{join, split, Compression, JoinError, PackageReader, SplitError};

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

fn write_package(path: &Path, builder: &PackageBuilder, payload: &[u8]) {
    fs::write(path, builder.package_bytes(payload).unwrap()).unwrap();
}

#[test]
fn split_then_join_reproduces_the_pair() {
    for compressor in &["gzip", "bzip2", "xz", "lzma", "zstd"] {
        let dir = tempfile::tempdir().unwrap();
        let body = payload(64 * 1024 + 3);
        let builder = PackageBuilder::new("roundtrip")
            .payload_size(body.len() as u64)
            .compressor(compressor)
            .flags("9");
        write_package(&dir.path().join("a.rpm"), &builder, &body);

        split(
            dir.path().join("a.rpm"),
            dir.path().join("a.hdr"),
            dir.path().join("a.cpio"),
        )
        .unwrap();
        join(
            dir.path().join("a.hdr"),
            dir.path().join("a.cpio"),
            dir.path().join("b.rpm"),
        )
        .unwrap();
        split(
            dir.path().join("b.rpm"),
            dir.path().join("b.hdr"),
            dir.path().join("b.cpio"),
        )
        .unwrap();

        assert_eq!(
            fs::read(dir.path().join("a.hdr")).unwrap(),
            fs::read(dir.path().join("b.hdr")).unwrap(),
            "header differs for {}",
            compressor
        );
        assert_eq!(fs::read(dir.path().join("b.cpio")).unwrap(), body, "payload differs for {}", compressor);
    }
}

#[test]
fn split_output_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let body = payload(4096);
    let builder = PackageBuilder::new("stable")
        .payload_size(body.len() as u64)
        .compressor("xz");
    write_package(&dir.path().join("pkg.rpm"), &builder, &body);

    for round in &["one", "two"] {
        split(
            dir.path().join("pkg.rpm"),
            dir.path().join(format!("{}.hdr", round)),
            dir.path().join(format!("{}.cpio", round)),
        )
        .unwrap();
    }

    assert_eq!(
        fs::read(dir.path().join("one.hdr")).unwrap(),
        fs::read(dir.path().join("two.hdr")).unwrap()
    );
    assert_eq!(
        fs::read(dir.path().join("one.cpio")).unwrap(),
        fs::read(dir.path().join("two.cpio")).unwrap()
    );
}

#[test]
fn xz_package_splits_into_header_and_payload() {
    let dir = tempfile::tempdir().unwrap();
    let body = payload(1024);
    let builder = PackageBuilder::new("xzpkg")
        .payload_size(1024)
        .compressor("xz")
        .flags("2");
    write_package(&dir.path().join("xz.rpm"), &builder, &body);

    let stats = split(
        dir.path().join("xz.rpm"),
        dir.path().join("xz.hdr"),
        dir.path().join("xz.cpio"),
    )
    .unwrap();

    assert_eq!(stats.compression, Compression::Xz);
    assert_eq!(stats.payload_size, 1024);
    assert_eq!(stats.header_size, builder.metadata_bytes().len() as u64);
    assert_eq!(fs::read(dir.path().join("xz.cpio")).unwrap(), body);
    assert_eq!(fs::read(dir.path().join("xz.hdr")).unwrap(), builder.metadata_bytes());
}

#[test]
fn xz_metadata_and_payload_join_then_split_back() {
    let dir = tempfile::tempdir().unwrap();
    let body = payload(1024);
    let builder = PackageBuilder::new("xzjoin")
        .payload_size(1024)
        .compressor("xz");
    fs::write(dir.path().join("in.hdr"), builder.metadata_bytes()).unwrap();
    fs::write(dir.path().join("in.cpio"), &body).unwrap();

    join(
        dir.path().join("in.hdr"),
        dir.path().join("in.cpio"),
        dir.path().join("joined.rpm"),
    )
    .unwrap();
    split(
        dir.path().join("joined.rpm"),
        dir.path().join("out.hdr"),
        dir.path().join("out.cpio"),
    )
    .unwrap();

    assert_eq!(
        fs::read(dir.path().join("out.hdr")).unwrap(),
        fs::read(dir.path().join("in.hdr")).unwrap()
    );
    assert_eq!(
        fs::read(dir.path().join("out.cpio")).unwrap(),
        fs::read(dir.path().join("in.cpio")).unwrap()
    );
}

#[test]
fn join_defaults_to_gzip_level_nine() {
    let dir = tempfile::tempdir().unwrap();
    let body = payload(2048);
    let builder = PackageBuilder::new("plain")
        .payload_size(body.len() as u64)
        .flags("9");
    fs::write(dir.path().join("plain.hdr"), builder.metadata_bytes()).unwrap();
    fs::write(dir.path().join("plain.cpio"), &body).unwrap();

    let stats = join(
        dir.path().join("plain.hdr"),
        dir.path().join("plain.cpio"),
        dir.path().join("plain.rpm"),
    )
    .unwrap();
    assert_eq!(stats.compression, Compression::Gzip);

    let package = fs::read(dir.path().join("plain.rpm")).unwrap();
    let offset = builder.metadata_bytes().len();
    assert_eq!(&package[..offset], &builder.metadata_bytes()[..]);
    // gzip member header, XFL = 2 marks maximum compression
    assert_eq!(&package[offset..offset + 2], &[0x1f, 0x8b]);
    assert_eq!(package[offset + 8], 2);

    let reader = PackageReader::open(dir.path().join("plain.rpm")).unwrap();
    assert_eq!(reader.payload_offset(), offset as u64);
    assert_eq!(
        reader.metadata().payload_info().unwrap().codec.write_spec(),
        "w9.gzip"
    );
}

#[test]
fn size_is_read_from_signature_when_header_lacks_it() {
    let dir = tempfile::tempdir().unwrap();
    let body = payload(300);
    let builder = PackageBuilder::new("old")
        .signature_tag(tags::SIGTAG_PAYLOADSIZE, Value::Int32(vec![300]))
        .compressor("bzip2");
    write_package(&dir.path().join("old.rpm"), &builder, &body);

    let stats = split(
        dir.path().join("old.rpm"),
        dir.path().join("old.hdr"),
        dir.path().join("old.cpio"),
    )
    .unwrap();

    assert_eq!(stats.payload_size, 300);
}

#[test]
fn split_rejects_wrong_declared_size() {
    let dir = tempfile::tempdir().unwrap();
    let builder = PackageBuilder::new("bad").payload_size(1000);
    write_package(&dir.path().join("bad.rpm"), &builder, &payload(999));

    let err = split(
        dir.path().join("bad.rpm"),
        dir.path().join("bad.hdr"),
        dir.path().join("bad.cpio"),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        SplitError::SizeMismatch {
            expected: 1000,
            actual: 999
        }
    ));
    assert!(!dir.path().join("bad.hdr").exists());
    assert!(!dir.path().join("bad.cpio").exists());
}

#[test]
fn join_rejects_payload_of_wrong_size() {
    let dir = tempfile::tempdir().unwrap();
    let builder = PackageBuilder::new("grown").payload_size(10);
    fs::write(dir.path().join("grown.hdr"), builder.metadata_bytes()).unwrap();
    fs::write(dir.path().join("grown.cpio"), payload(11)).unwrap();

    let err = join(
        dir.path().join("grown.hdr"),
        dir.path().join("grown.cpio"),
        dir.path().join("grown.rpm"),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        JoinError::SizeMismatch {
            expected: 10,
            actual: 11
        }
    ));
    assert!(!dir.path().join("grown.rpm").exists());
}

#[test]
fn failed_split_keeps_previous_outputs() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("junk.rpm"), b"definitely not a package").unwrap();
    fs::write(dir.path().join("junk.hdr"), b"previous header").unwrap();

    let err = split(
        dir.path().join("junk.rpm"),
        dir.path().join("junk.hdr"),
        dir.path().join("junk.cpio"),
    )
    .unwrap_err();

    assert_eq!(err.to_string(), "argument is not an RPM package");
    assert_eq!(fs::read(dir.path().join("junk.hdr")).unwrap(), b"previous header");
    assert!(!dir.path().join("junk.cpio").exists());
}

#[test]
fn truncated_header_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let builder = PackageBuilder::new("cut").payload_size(5);
    let mut bytes = builder.metadata_bytes();
    bytes.truncate(bytes.len() - 3);
    fs::write(dir.path().join("cut.hdr"), &bytes).unwrap();
    fs::write(dir.path().join("cut.cpio"), b"12345").unwrap();

    let err = join(
        dir.path().join("cut.hdr"),
        dir.path().join("cut.cpio"),
        dir.path().join("cut.rpm"),
    )
    .unwrap_err();

    assert_eq!(err.to_string(), "error reading header from package");
    assert!(!dir.path().join("cut.rpm").exists());
}
