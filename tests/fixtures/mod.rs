//! Shared helpers for integration tests
//!
//! - Fixture manifests under `tests/fixtures/keys`
//! - Small builders for target-files trees and APEX containers

#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Path to a fixture manifest
pub fn keys_fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/keys")
        .join(name)
}

/// Read a fixture manifest
pub fn read_keys_fixture(name: &str) -> String {
    fs::read_to_string(keys_fixture(name)).expect("fixture exists")
}

/// Write `data` at `root/path`, creating parent directories
pub fn write_file(root: &Path, path: &str, data: impl AsRef<[u8]>) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().expect("path has a parent")).expect("create parent");
    fs::write(full, data).expect("write file");
}

/// Protobuf-encoded apex_manifest.pb with name and version 1
pub fn manifest_pb(name: &str) -> Vec<u8> {
    let mut buf = vec![0x0a, name.len() as u8];
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(&[0x10, 0x01]);
    buf
}

/// Zip archive bytes holding the given entries, uncompressed
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).expect("start entry");
        writer.write_all(data).expect("write entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// An .apex container for `package`
pub fn apex_bytes(package: &str) -> Vec<u8> {
    let manifest = manifest_pb(package);
    zip_bytes(&[
        ("apex_manifest.pb", manifest.as_slice()),
        ("apex_payload.img", b"payload".as_slice()),
    ])
}

/// A compressed .capex container wrapping an .apex for `package`
pub fn capex_bytes(package: &str) -> Vec<u8> {
    let inner = apex_bytes(package);
    zip_bytes(&[("original_apex", inner.as_slice())])
}

/// Install `bytes` as `<root>/<PARTITION>/apex/<file_name>`
pub fn install_apex(root: &Path, partition: &str, file_name: &str, bytes: &[u8]) {
    write_file(
        root,
        &format!("{}/apex/{}", partition.to_uppercase(), file_name),
        bytes,
    );
}

pub const COMPATIBILITY_MATRIX: &str = r#"<compatibility-matrix version="1.0" type="device">
    <sepolicy>
        <kernel-sepolicy-version>30</kernel-sepolicy-version>
        <sepolicy-version>30.0</sepolicy-version>
    </sepolicy>
</compatibility-matrix>
"#;

/// A framework tree with system/product content, META manifests and the
/// framework half of the sepolicy inputs.
pub fn framework_tree(root: &Path) {
    write_file(root, "SYSTEM/build.prop", "ro.build.id=FW1\n");
    write_file(root, "SYSTEM/etc/vintf/compatibility_matrix.device.xml", COMPATIBILITY_MATRIX);
    write_file(root, "SYSTEM/etc/selinux/plat_sepolicy.cil", "(plat)\n");
    write_file(root, "SYSTEM/etc/selinux/mapping/30.0.cil", "(mapping)\n");
    write_file(root, "SYSTEM/etc/selinux/mapping/30.0.compat.cil", "(compat)\n");
    write_file(root, "PRODUCT/etc/selinux/product_sepolicy.cil", "(product)\n");
    write_file(root, "ROOT/init.rc", "on boot\n");
    write_file(root, "VENDOR/should_not_copy", "framework vendor\n");
    write_file(root, "META/apexkeys.txt", read_keys_fixture("apexkeys_framework.txt"));
    write_file(root, "META/apkcerts.txt", read_keys_fixture("apkcerts_framework.txt"));
    write_file(
        root,
        "META/misc_info.txt",
        "avb_enable=true\nbuild_type=user\nrecovery_api_version=3\nfs_type=ext4\n",
    );
    install_apex(root, "system", "com.android.wifi.capex", &capex_bytes("com.android.wifi"));
}

/// A vendor tree with vendor/odm content, META manifests and the vendor half
/// of the sepolicy inputs.
pub fn vendor_tree(root: &Path) {
    write_file(root, "VENDOR/build.prop", "ro.vendor.build.id=V1\n");
    write_file(root, "VENDOR/etc/selinux/plat_sepolicy_vers.txt", "30.0\n");
    write_file(root, "VENDOR/etc/selinux/vendor_sepolicy.cil", "(vendor)\n");
    write_file(root, "VENDOR/etc/selinux/plat_pub_versioned.cil", "(pub)\n");
    write_file(root, "ODM/etc/selinux/odm_sepolicy.cil", "(odm)\n");
    write_file(root, "OTA/android-info.txt", "board=test\n");
    write_file(root, "SYSTEM/should_not_copy", "vendor system\n");
    write_file(root, "META/apexkeys.txt", read_keys_fixture("apexkeys_vendor.txt"));
    write_file(root, "META/apkcerts.txt", read_keys_fixture("apkcerts_vendor.txt"));
    write_file(
        root,
        "META/misc_info.txt",
        "avb_enable=false\nbuild_type=userdebug\nboard_uses_vendorimage=true\n",
    );
    install_apex(root, "vendor", "com.vendor.camera.apex", &apex_bytes("com.vendor.camera"));
}
