/// Relationship part for `part`, e.g. `xl/worksheets/sheet1.xml` → `xl/worksheets/_rels/sheet1.xml.rels`.
pub(crate) fn rels_for_part(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file_name)) => format!("{dir}/_rels/{file_name}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the part that owns the relationship.
pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    // Part names never carry a fragment.
    let target = target.split('#').next().unwrap_or(target);
    if target.is_empty() {
        return normalize(source_part);
    }
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize(absolute);
    }
    let base_dir = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    normalize(&format!("{base_dir}/{target}"))
}

/// Target written into a `.rels` file for `target_part`, relative to the directory of `source_part`.
pub(crate) fn relative_target(source_part: &str, target_part: &str) -> String {
    let source_dir: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let target: Vec<&str> = target_part.split('/').collect();
    let shared = source_dir
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut out: Vec<&str> = vec![".."; source_dir.len() - shared];
    out.extend_from_slice(&target[shared..]);
    out.join("/")
}

/// Lower-cased file extension of a part name, if any.
pub(crate) fn extension(part: &str) -> Option<String> {
    let file_name = part.rsplit('/').next().unwrap_or(part);
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

fn normalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rels_part_sits_next_to_its_source() {
        assert_eq!(rels_for_part("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
        assert_eq!(rels_for_part("workbook.xml"), "_rels/workbook.xml.rels");
    }

    #[test]
    fn targets_resolve_relative_to_the_source_dir() {
        assert_eq!(
            resolve_target("xl/drawings/drawing1.xml", "../media/image1.png"),
            "xl/media/image1.png"
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "worksheets/sheet1.xml#frag"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "/xl/./worksheets/sheet2.xml"),
            "xl/worksheets/sheet2.xml"
        );
    }

    #[test]
    fn relative_targets_climb_out_of_the_source_dir() {
        assert_eq!(
            relative_target("xl/worksheets/sheet1.xml", "xl/drawings/drawing1.xml"),
            "../drawings/drawing1.xml"
        );
        assert_eq!(
            relative_target("xl/workbook.xml", "xl/styles.xml"),
            "styles.xml"
        );
        assert_eq!(relative_target("[Content_Types].xml", "xl/workbook.xml"), "xl/workbook.xml");
    }

    #[test]
    fn extensions_are_lowercased() {
        assert_eq!(extension("xl/media/image1.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension("xl/media/blob"), None);
    }

    proptest! {
        #[test]
        fn relative_targets_resolve_back_to_the_target(
            source in "[a-z]{1,4}(/[a-z]{1,4}){0,3}\\.xml",
            target in "[a-z]{1,4}(/[a-z]{1,4}){0,3}\\.png",
        ) {
            let rel = relative_target(&source, &target);
            prop_assert_eq!(resolve_target(&source, &rel), target);
        }
    }
}
