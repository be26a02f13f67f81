//! Split sepolicy compile planning
//!
//! The merged tree carries CIL fragments from both builds. The framework's
//! device compatibility matrix pins the kernel policy version and the vendor
//! build pins the platform policy version it was built against; the two must
//! agree before a combined policy can be compiled.
//!
//! The planner only builds the compiler command line. Running it is the
//! caller's job, through [`crate::process::CommandRunner`].

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex_lite::Regex;
use tracing::warn;

use crate::config::DEFAULT_SEPOLICY_COMPILER;

/// Where the compiled policy lands, relative to the merged tree
pub const COMBINED_SEPOLICY: &str = "META/combined_sepolicy";

/// Framework compatibility matrix, relative to the system partition
pub const COMPATIBILITY_MATRIX: &str = "etc/vintf/compatibility_matrix.device.xml";

/// Vendor platform policy version pin, relative to the vendor partition
pub const VENDOR_PLAT_VERSION: &str = "etc/selinux/plat_sepolicy_vers.txt";

/// Compiler flags, matching what init passes when loading split policy
const COMPILER_FLAGS: &[&str] = &["-m", "-M", "true", "-G", "-N"];

/// A policy fragment: partition role, path inside that partition, and
/// whether its absence fails the plan. `{version}` is replaced by the
/// vendor platform version.
struct Fragment {
    role: &'static str,
    path: &'static str,
    required: bool,
}

const FRAGMENTS: &[Fragment] = &[
    Fragment { role: "system", path: "etc/selinux/plat_sepolicy.cil", required: true },
    Fragment { role: "system", path: "etc/selinux/mapping/{version}.cil", required: true },
    Fragment { role: "vendor", path: "etc/selinux/vendor_sepolicy.cil", required: true },
    Fragment { role: "vendor", path: "etc/selinux/plat_pub_versioned.cil", required: true },
    Fragment { role: "system", path: "etc/selinux/mapping/{version}.compat.cil", required: false },
    Fragment { role: "system_ext", path: "etc/selinux/system_ext_sepolicy.cil", required: false },
    Fragment { role: "system_ext", path: "etc/selinux/mapping/{version}.cil", required: false },
    Fragment { role: "product", path: "etc/selinux/product_sepolicy.cil", required: false },
    Fragment { role: "product", path: "etc/selinux/mapping/{version}.cil", required: false },
    Fragment { role: "odm", path: "etc/selinux/odm_sepolicy.cil", required: false },
];

/// Sepolicy planning errors
#[derive(Debug, thiserror::Error)]
pub enum SepolicyError {
    #[error("partition role '{0}' is not in the partition map")]
    MissingRole(String),

    #[error("missing required sepolicy file {0}")]
    MissingFile(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0} does not declare sepolicy/kernel-sepolicy-version")]
    MissingKernelVersion(PathBuf),

    #[error("kernel sepolicy version '{0}' is not an integer")]
    InvalidVersion(String),

    #[error("sepolicy version mismatch: compatibility matrix declares {matrix}, vendor is pinned to {vendor}")]
    VersionMismatch { matrix: String, vendor: String },
}

/// The two negotiated versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SepolicyVersion {
    /// Kernel policy version from the compatibility matrix (e.g. "30")
    pub kernel: u32,
    /// Platform version the vendor policy was built against (e.g. "30.0")
    pub vendor_plat: String,
}

/// A fully resolved compile step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SepolicyPlan {
    pub version: SepolicyVersion,
    /// CIL fragments in compile order
    pub fragments: Vec<PathBuf>,
    /// Roles with fragments that are absent from the partition map
    pub skipped_roles: Vec<String>,
    pub output: PathBuf,
    pub command: Vec<String>,
}

fn kernel_version_regex() -> &'static Regex {
    static KERNEL: OnceLock<Regex> = OnceLock::new();
    KERNEL.get_or_init(|| {
        Regex::new(
            r"(?s)<sepolicy>.*?<kernel-sepolicy-version>\s*([^<\s]+)\s*</kernel-sepolicy-version>",
        )
        .expect("kernel version pattern is valid")
    })
}

/// Extract `sepolicy/kernel-sepolicy-version` from a compatibility matrix
pub fn parse_kernel_sepolicy_version(xml: &str) -> Option<String> {
    kernel_version_regex()
        .captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Check that the matrix and vendor versions agree.
///
/// `30` agrees with `30` and with `30.0`; it does not agree with `30.7` or
/// `29.0`.
pub fn negotiate_version(matrix: &str, vendor: &str) -> Result<SepolicyVersion, SepolicyError> {
    let kernel: u32 = matrix
        .parse()
        .map_err(|_| SepolicyError::InvalidVersion(matrix.to_string()))?;

    if vendor != matrix && vendor != format!("{}.0", matrix) {
        return Err(SepolicyError::VersionMismatch {
            matrix: matrix.to_string(),
            vendor: vendor.to_string(),
        });
    }

    Ok(SepolicyVersion {
        kernel,
        vendor_plat: vendor.to_string(),
    })
}

fn read_to_string(path: &Path) -> Result<String, SepolicyError> {
    if !path.exists() {
        return Err(SepolicyError::MissingFile(path.to_path_buf()));
    }
    fs::read_to_string(path).map_err(|source| SepolicyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Builds the policy compiler invocation for a merged tree
#[derive(Debug, Clone)]
pub struct SepolicyPlanner {
    compiler: String,
}

impl Default for SepolicyPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_SEPOLICY_COMPILER)
    }
}

impl SepolicyPlanner {
    pub fn new(compiler: impl Into<String>) -> Self {
        Self {
            compiler: compiler.into(),
        }
    }

    /// Negotiate the version and lay out the compile step.
    pub fn plan(
        &self,
        product_out: &Path,
        partition_map: &BTreeMap<String, String>,
    ) -> Result<SepolicyPlan, SepolicyError> {
        let partition_dir = |role: &str| -> Option<PathBuf> {
            partition_map.get(role).map(|dir| product_out.join(dir))
        };
        let required_dir = |role: &str| -> Result<PathBuf, SepolicyError> {
            partition_dir(role).ok_or_else(|| SepolicyError::MissingRole(role.to_string()))
        };

        let matrix_path = required_dir("system")?.join(COMPATIBILITY_MATRIX);
        let matrix_version = parse_kernel_sepolicy_version(&read_to_string(&matrix_path)?)
            .ok_or_else(|| SepolicyError::MissingKernelVersion(matrix_path.clone()))?;

        let vendor_path = required_dir("vendor")?.join(VENDOR_PLAT_VERSION);
        let vendor_version = read_to_string(&vendor_path)?.trim().to_string();

        let version = negotiate_version(&matrix_version, &vendor_version)?;

        let mut fragments = Vec::new();
        let mut skipped_roles: Vec<String> = Vec::new();
        for fragment in FRAGMENTS {
            let Some(dir) = partition_dir(fragment.role) else {
                if !skipped_roles.iter().any(|r| r == fragment.role) {
                    warn!(role = fragment.role, "cannot load sepolicy files for missing partition");
                    skipped_roles.push(fragment.role.to_string());
                }
                continue;
            };
            let path = dir.join(fragment.path.replace("{version}", &version.vendor_plat));
            if path.exists() {
                fragments.push(path);
            } else if fragment.required {
                return Err(SepolicyError::MissingFile(path));
            }
        }

        let output = product_out.join(COMBINED_SEPOLICY);

        let mut command = vec![self.compiler.clone()];
        command.extend(COMPILER_FLAGS.iter().map(|f| f.to_string()));
        command.extend(["-c".to_string(), version.kernel.to_string()]);
        command.extend(["-o".to_string(), output.to_string_lossy().into_owned()]);
        command.extend(["-f".to_string(), "/dev/null".to_string()]);
        command.extend(fragments.iter().map(|p| p.to_string_lossy().into_owned()));

        Ok(SepolicyPlan {
            version,
            fragments,
            skipped_roles,
            output,
            command,
        })
    }
}

/// Compiler command for the merged tree, using the default compiler name.
pub fn compile_split_sepolicy(
    product_out: &Path,
    partition_map: &BTreeMap<String, String>,
) -> Result<Vec<String>, SepolicyError> {
    SepolicyPlanner::default()
        .plan(product_out, partition_map)
        .map(|plan| plan.command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MATRIX: &str = r#"
      <compatibility-matrix>
        <sepolicy>
          <kernel-sepolicy-version>30</kernel-sepolicy-version>
        </sepolicy>
      </compatibility-matrix>"#;

    fn write_temp_file(root: &Path, path: &str, data: &str) {
        let full_path = root.join(path);
        fs::create_dir_all(full_path.parent().unwrap()).unwrap();
        fs::write(full_path, data).unwrap();
    }

    fn partition_map(roles: &[&str]) -> BTreeMap<String, String> {
        roles.iter().map(|r| (r.to_string(), r.to_string())).collect()
    }

    fn populate(root: &Path) {
        write_temp_file(root, "system/etc/vintf/compatibility_matrix.device.xml", MATRIX);
        write_temp_file(root, "vendor/etc/selinux/plat_sepolicy_vers.txt", "30.0");
        write_temp_file(root, "system/etc/selinux/plat_sepolicy.cil", "");
        write_temp_file(root, "system/etc/selinux/mapping/30.0.cil", "");
        write_temp_file(root, "product/etc/selinux/mapping/30.0.cil", "");
        write_temp_file(root, "vendor/etc/selinux/vendor_sepolicy.cil", "");
        write_temp_file(root, "vendor/etc/selinux/plat_pub_versioned.cil", "");
    }

    #[test]
    fn test_compile_split_sepolicy() {
        let dir = TempDir::new().unwrap();
        let otp = dir.path();
        populate(otp);

        let cmd =
            compile_split_sepolicy(otp, &partition_map(&["system", "product", "vendor"])).unwrap();

        let expected = format!(
            "secilc -m -M true -G -N -c 30 \
             -o {otp}/META/combined_sepolicy -f /dev/null \
             {otp}/system/etc/selinux/plat_sepolicy.cil \
             {otp}/system/etc/selinux/mapping/30.0.cil \
             {otp}/vendor/etc/selinux/vendor_sepolicy.cil \
             {otp}/vendor/etc/selinux/plat_pub_versioned.cil \
             {otp}/product/etc/selinux/mapping/30.0.cil",
            otp = otp.display()
        );
        assert_eq!(cmd.join(" "), expected);
    }

    #[test]
    fn test_missing_product_role_is_skipped() {
        let dir = TempDir::new().unwrap();
        populate(dir.path());

        let plan = SepolicyPlanner::new("/opt/secilc")
            .plan(dir.path(), &partition_map(&["system", "vendor"]))
            .unwrap();

        assert_eq!(plan.command[0], "/opt/secilc");
        assert_eq!(plan.fragments.len(), 4);
        assert!(plan.fragments.iter().all(|f| !f.starts_with(dir.path().join("product"))));
        assert_eq!(plan.version.kernel, 30);
        assert_eq!(plan.version.vendor_plat, "30.0");
        assert_eq!(plan.skipped_roles, vec!["system_ext", "product", "odm"]);
    }

    #[test]
    fn test_optional_fragments_in_order() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        populate(root);
        write_temp_file(root, "odm/etc/selinux/odm_sepolicy.cil", "");
        write_temp_file(root, "system_ext/etc/selinux/system_ext_sepolicy.cil", "");
        write_temp_file(root, "system/etc/selinux/mapping/30.0.compat.cil", "");

        let plan = SepolicyPlanner::default()
            .plan(
                root,
                &partition_map(&["system", "system_ext", "product", "vendor", "odm"]),
            )
            .unwrap();

        let rel: Vec<String> = plan
            .fragments
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            rel,
            vec![
                "system/etc/selinux/plat_sepolicy.cil",
                "system/etc/selinux/mapping/30.0.cil",
                "vendor/etc/selinux/vendor_sepolicy.cil",
                "vendor/etc/selinux/plat_pub_versioned.cil",
                "system/etc/selinux/mapping/30.0.compat.cil",
                "system_ext/etc/selinux/system_ext_sepolicy.cil",
                "product/etc/selinux/mapping/30.0.cil",
                "odm/etc/selinux/odm_sepolicy.cil",
            ]
        );
        assert!(plan.command.ends_with(
            &plan
                .fragments
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
        ));
    }

    #[test]
    fn test_version_mismatch() {
        let dir = TempDir::new().unwrap();
        populate(dir.path());
        write_temp_file(dir.path(), "vendor/etc/selinux/plat_sepolicy_vers.txt", "29.0\n");

        let err = compile_split_sepolicy(dir.path(), &partition_map(&["system", "vendor"]))
            .unwrap_err();
        match err {
            SepolicyError::VersionMismatch { matrix, vendor } => {
                assert_eq!(matrix, "30");
                assert_eq!(vendor, "29.0");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_fragment() {
        let dir = TempDir::new().unwrap();
        populate(dir.path());
        fs::remove_file(dir.path().join("vendor/etc/selinux/plat_pub_versioned.cil")).unwrap();

        let err = compile_split_sepolicy(dir.path(), &partition_map(&["system", "vendor"]))
            .unwrap_err();
        assert!(matches!(err, SepolicyError::MissingFile(p) if p.ends_with("plat_pub_versioned.cil")));
    }

    #[test]
    fn test_missing_vendor_role() {
        let dir = TempDir::new().unwrap();
        populate(dir.path());
        let err = compile_split_sepolicy(dir.path(), &partition_map(&["system"])).unwrap_err();
        assert!(matches!(err, SepolicyError::MissingRole(r) if r == "vendor"));
    }

    #[test]
    fn test_negotiate_version() {
        assert!(negotiate_version("30", "30.0").is_ok());
        assert!(negotiate_version("30", "30").is_ok());
        assert!(matches!(
            negotiate_version("30", "30.7"),
            Err(SepolicyError::VersionMismatch { .. })
        ));
        assert!(matches!(
            negotiate_version("30", "300.0"),
            Err(SepolicyError::VersionMismatch { .. })
        ));
        assert!(matches!(
            negotiate_version("thirty", "30.0"),
            Err(SepolicyError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_parse_kernel_version() {
        assert_eq!(parse_kernel_sepolicy_version(MATRIX), Some("30".to_string()));
        assert_eq!(
            parse_kernel_sepolicy_version("<compatibility-matrix></compatibility-matrix>"),
            None
        );
    }
}
