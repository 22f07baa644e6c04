//! Built-in signature catalog, used when no catalog file is configured.
//!
//! Only formats with both a header and a footer signature are listed; a
//! carve needs both ends.

pub const BUILTIN_CATALOG: &str = r#"# Sawmill built-in signature catalog

# === Images ===

[[signature]]
name = "jpg"
header = '\xFF\xD8\xFF'
footer = '\xFF\xD9'
max_size = 52428800

[[signature]]
name = "png"
header = '\x89\x50\x4E\x47\x0D\x0A\x1A\x0A'
footer = '\x49\x45\x4E\x44\xAE\x42\x60\x82'
max_size = 104857600

[[signature]]
name = "gif"
header = '\x47\x49\x46\x38\x37\x61'
footer = '\x00\x3B'
max_size = 52428800

[[signature]]
name = "gif"
header = '\x47\x49\x46\x38\x39\x61'
footer = '\x00\x3B'
max_size = 52428800

# === Documents ===

[[signature]]
name = "pdf"
header = '\x25\x50\x44\x46'
footer = '\x25\x25\x45\x4F\x46'
max_size = 524288000

[[signature]]
name = "eps"
header = '\x25\x21\x50\x53\x2D\x41\x64\x6F\x62\x65'
footer = '\x25\x25\x45\x4F\x46'
max_size = 209715200

[[signature]]
name = "svg"
header = '\x3C\x73\x76\x67'
footer = '\x3C\x2F\x73\x76\x67\x3E'
max_size = 10485760

[[signature]]
name = "html"
header = '\x3C\x21\x44\x4F\x43\x54\x59\x50\x45\x20\x68\x74\x6D\x6C'
footer = '\x3C\x2F\x68\x74\x6D\x6C\x3E'
max_size = 10485760

[[signature]]
name = "html"
header = '\x3C\x68\x74\x6D\x6C'
footer = '\x3C\x2F\x68\x74\x6D\x6C\x3E'
max_size = 10485760

# === Archives ===

[[signature]]
name = "zip"
header = '\x50\x4B\x03\x04'
footer = '\x50\x4B\x05\x06'
max_size = 4294967296
"#;

#[cfg(test)]
mod tests {
    use super::super::Catalog;

    #[test]
    fn test_builtin_catalog_parses() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.len(), 10);
        assert_eq!(
            catalog.names(),
            vec!["eps", "gif", "html", "jpg", "pdf", "png", "svg", "zip"]
        );
    }

    #[test]
    fn test_builtin_jpeg_signature() {
        let groups = Catalog::builtin().unwrap().groups();
        let jpg = &groups["jpg"];
        assert_eq!(jpg.signatures[0].header, vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(jpg.signatures[0].footer, vec![0xFF, 0xD9]);
        assert_eq!(jpg.max_size, Some(50 * 1024 * 1024));
    }

    #[test]
    fn test_builtin_signatures_decode_to_ascii_markers() {
        let groups = Catalog::builtin().unwrap().groups();
        assert_eq!(groups["pdf"].signatures[0].header, b"%PDF");
        assert_eq!(groups["pdf"].signatures[0].footer, b"%%EOF");
        assert_eq!(groups["html"].signatures[0].header, b"<!DOCTYPE html");
        assert_eq!(groups["svg"].signatures[0].footer, b"</svg>");
        assert_eq!(groups["eps"].signatures[0].header, b"%!PS-Adobe");
    }
}
