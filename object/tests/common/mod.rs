//! Byte-level builders for the synthetic DICOM files used by the
//! integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use wsdicom_object::Tag;

pub fn short_element(tag: Tag, vr: &str, value: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&tag.group().to_le_bytes());
    data.extend_from_slice(&tag.element().to_le_bytes());
    data.extend_from_slice(vr.as_bytes());
    data.extend_from_slice(&(value.len() as u16).to_le_bytes());
    data.extend_from_slice(value);
    data
}

pub fn long_header(tag: Tag, vr: &str, len: u32) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&tag.group().to_le_bytes());
    data.extend_from_slice(&tag.element().to_le_bytes());
    data.extend_from_slice(vr.as_bytes());
    data.extend_from_slice(&[0, 0]);
    data.extend_from_slice(&len.to_le_bytes());
    data
}

fn delimiter(tag: Tag, len: u32) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&tag.group().to_le_bytes());
    data.extend_from_slice(&tag.element().to_le_bytes());
    data.extend_from_slice(&len.to_le_bytes());
    data
}

pub fn sq_undef(tag: Tag) -> Vec<u8> {
    long_header(tag, "SQ", 0xFFFF_FFFF)
}

pub fn item_undef() -> Vec<u8> {
    delimiter(Tag(0xFFFE, 0xE000), 0xFFFF_FFFF)
}

pub fn item_def(len: u32) -> Vec<u8> {
    delimiter(Tag(0xFFFE, 0xE000), len)
}

pub fn item_end() -> Vec<u8> {
    delimiter(Tag(0xFFFE, 0xE00D), 0)
}

pub fn sequence_end() -> Vec<u8> {
    delimiter(Tag(0xFFFE, 0xE0DD), 0)
}

/// A UID value padded with NUL to an even length.
pub fn padded_uid(uid: &str) -> Vec<u8> {
    let mut value = uid.as_bytes().to_vec();
    if value.len() % 2 == 1 {
        value.push(0);
    }
    value
}

/// The contents of a file meta group declaring the given transfer syntax
/// and, optionally, a Media Storage SOP Instance UID.
pub fn meta_group(ts_uid: &str, instance_uid: Option<&str>) -> Vec<u8> {
    let mut content = Vec::new();
    if let Some(uid) = instance_uid {
        content.extend(short_element(Tag(0x0002, 0x0003), "UI", &padded_uid(uid)));
    }
    content.extend(short_element(Tag(0x0002, 0x0010), "UI", &padded_uid(ts_uid)));
    content
}

/// A 128-byte preamble, the `DICM` magic code, and the file meta group
/// with its group length element.
pub fn preamble_and_meta(meta_elements: &[u8]) -> Vec<u8> {
    let mut data = vec![0u8; 128];
    data.extend_from_slice(b"DICM");
    data.extend(short_element(
        Tag(0x0002, 0x0000),
        "UL",
        &(meta_elements.len() as u32).to_le_bytes(),
    ));
    data.extend_from_slice(meta_elements);
    data
}

/// A scratch directory for test files, removed on drop.
#[derive(Debug)]
pub struct TestDir {
    pub dir: PathBuf,
}

impl TestDir {
    pub fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

pub fn test_dir(name: &str) -> TestDir {
    let dir = std::env::temp_dir().join(format!("wsdicom-{}-{}", std::process::id(), name));
    fs::create_dir_all(&dir).unwrap();
    TestDir { dir }
}
