use std::io::{Read, Seek};

use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{Result, XlsxError};

/// Default maximum uncompressed size of any single part inflated into memory.
pub const DEFAULT_MAX_PART_BYTES: u64 = 256 * 1024 * 1024; // 256MiB

/// Default maximum total uncompressed bytes inflated while importing one package.
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024; // 512MiB

/// Inflate limits guarding against zip bombs and forged size metadata.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct XlsxPackageLimits {
    pub max_part_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for XlsxPackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: DEFAULT_MAX_PART_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Canonical form of a part name for lookups: percent-escapes decoded, `\` turned into `/`,
/// leading separators dropped, ASCII lower-cased.
pub(crate) fn canonical_part_name(name: &str) -> String {
    let mut bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut leading = true;
    while let Some(&b) = bytes.first() {
        let decoded = match (b, bytes.get(1).copied().and_then(hex_val), bytes.get(2).copied().and_then(hex_val)) {
            (b'%', Some(hi), Some(lo)) => {
                bytes = &bytes[3..];
                (hi << 4) | lo
            }
            _ => {
                bytes = &bytes[1..];
                b
            }
        };
        if leading && matches!(decoded, b'/' | b'\\') {
            continue;
        }
        leading = false;
        out.push(if decoded == b'\\' {
            b'/'
        } else {
            decoded.to_ascii_lowercase()
        });
    }
    String::from_utf8_lossy(&out).into_owned()
}

pub(crate) fn part_names_equivalent(a: &str, b: &str) -> bool {
    canonical_part_name(a) == canonical_part_name(b)
}

/// Open a part by name, preferring an exact entry over a `/`-prefixed or merely equivalent one.
pub(crate) fn open_zip_part<'a, R: Read + Seek>(
    archive: &'a mut ZipArchive<R>,
    name: &str,
) -> std::result::Result<ZipFile<'a, R>, ZipError> {
    let mut candidate: Option<(usize, u8)> = None;
    for (idx, entry) in archive.file_names().enumerate() {
        if entry == name {
            candidate = Some((idx, 3));
            break;
        }
        if entry.strip_prefix('/') == Some(name) {
            candidate = Some((idx, 2));
            continue;
        }
        if candidate.is_none() && part_names_equivalent(entry, name) {
            candidate = Some((idx, 1));
        }
    }

    match candidate {
        Some((idx, _)) => archive.by_index(idx),
        None => Err(ZipError::FileNotFound),
    }
}

/// Running total of inflated bytes for one package.
#[derive(Debug, Clone)]
pub(crate) struct InflateBudget {
    limits: XlsxPackageLimits,
    used_bytes: u64,
}

impl InflateBudget {
    pub(crate) fn new(limits: XlsxPackageLimits) -> Self {
        Self {
            limits,
            used_bytes: 0,
        }
    }

    /// Read a whole part, failing once it exceeds either the per-part or the package limit.
    pub(crate) fn read<R: Read>(&mut self, file: &mut ZipFile<'_, R>, part: &str) -> Result<Vec<u8>> {
        let max_part = self.limits.max_part_bytes;
        let remaining = self.limits.max_total_bytes.saturating_sub(self.used_bytes);

        let declared = file.size();
        if declared > max_part {
            return Err(XlsxError::PartTooLarge {
                part: part.to_string(),
                size: declared,
                max: max_part,
            });
        }
        if declared > remaining {
            return Err(XlsxError::PackageTooLarge {
                total: self.used_bytes.saturating_add(declared),
                max: self.limits.max_total_bytes,
            });
        }

        // Declared sizes can lie; cap the actual read one byte past the effective limit.
        let effective = max_part.min(remaining);
        let mut buf = Vec::new();
        file.take(effective.saturating_add(1)).read_to_end(&mut buf)?;
        let observed = buf.len() as u64;
        if observed > effective {
            if effective == max_part {
                return Err(XlsxError::PartTooLarge {
                    part: part.to_string(),
                    size: observed,
                    max: max_part,
                });
            }
            return Err(XlsxError::PackageTooLarge {
                total: self.used_bytes.saturating_add(observed),
                max: self.limits.max_total_bytes,
            });
        }

        self.used_bytes += observed;
        Ok(buf)
    }
}

/// Read an optional part. A missing entry or a directory entry is `Ok(None)`.
pub(crate) fn read_zip_part_optional<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    budget: &mut InflateBudget,
) -> Result<Option<Vec<u8>>> {
    match open_zip_part(archive, name) {
        Ok(mut file) => {
            if file.is_dir() {
                return Ok(None);
            }
            budget.read(&mut file, name).map(Some)
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}
