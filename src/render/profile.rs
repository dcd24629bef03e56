use nostr_core::{clean_content, short_hex, single_line};
use nostr_sdk::prelude::{PublicKey, ToBech32};
use serde_json::{json, Value};
use vault_frontmatter::{is_plain_scalar, Frontmatter, FrontmatterCodec};

use super::{assemble, existing_frontmatter};

const REFERENCE_SCAFFOLD: &str = "## Author Of\n\n## Mentioned In\n\n## Contacts";

/// Identity fields of a kind-0 event, each trimmed and non-empty if present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileMetadata {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub about: Option<String>,
    pub picture: Option<String>,
    pub banner: Option<String>,
    pub website: Option<String>,
    pub nip05: Option<String>,
    pub lud16: Option<String>,
}

impl ProfileMetadata {
    /// Parse kind-0 content. Returns `None` unless it is a JSON object.
    ///
    /// Fields of the wrong type are ignored rather than failing the whole
    /// profile; clients in the wild are inconsistent.
    pub fn from_content(content: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(content).ok()?;
        let obj = value.as_object()?;
        let field = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| obj.get(*key).and_then(Value::as_str))
                .map(str::trim)
                .find(|s| !s.is_empty())
                .map(str::to_string)
        };
        Some(Self {
            name: field(&["name"]),
            display_name: field(&["display_name", "displayName"]),
            about: field(&["about"]),
            picture: field(&["picture"]),
            banner: field(&["banner"]),
            website: field(&["website"]),
            nip05: field(&["nip05"]),
            lud16: field(&["lud16"]),
        })
    }
}

/// `display_name`, else `name`, else `Nostr User <short pubkey>`, on a
/// single line.
pub fn profile_display_name(meta: &ProfileMetadata, pubkey: &str) -> String {
    [&meta.display_name, &meta.name]
        .into_iter()
        .filter_map(|name| name.as_deref().map(single_line))
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| format!("Nostr User {}", short_hex(pubkey)))
}

pub struct ProfileRenderer {
    codec: FrontmatterCodec,
    reference_sections: bool,
}

impl ProfileRenderer {
    pub fn new(codec: FrontmatterCodec, reference_sections: bool) -> Self {
        Self {
            codec,
            reference_sections,
        }
    }

    pub fn required_frontmatter(&self, pubkey: &str, created_at: u64, meta: &ProfileMetadata) -> Frontmatter {
        let mut fm = Frontmatter::new();
        fm.insert("aliases".into(), json!([pubkey]));
        fm.insert("pubkey".into(), json!(pubkey));
        if let Some(npub) = npub(pubkey) {
            fm.insert("npub".into(), json!(npub));
        }
        let fields = [
            ("name", &meta.name),
            ("display_name", &meta.display_name),
            ("nip05", &meta.nip05),
            ("lud16", &meta.lud16),
            ("website", &meta.website),
            ("picture", &meta.picture),
            ("banner", &meta.banner),
        ];
        for (key, value) in fields {
            // Values the block cannot hold verbatim are left out.
            if let Some(value) = value.as_deref().filter(|v| is_plain_scalar(v)) {
                fm.insert(key.into(), json!(value));
            }
        }
        fm.insert("created_at".into(), json!(created_at));
        fm
    }

    /// Render the profile document. `title` is the heading, usually
    /// [`profile_display_name`].
    pub fn render(
        &self,
        title: &str,
        pubkey: &str,
        created_at: u64,
        meta: &ProfileMetadata,
        existing: Option<&str>,
    ) -> String {
        let required = self.required_frontmatter(pubkey, created_at, meta);
        let merged = self
            .codec
            .merge(&existing_frontmatter(&self.codec, existing), &required);

        let mut parts = vec![
            format!("# {}", single_line(title)),
            self.codec.stringify(&merged),
            meta.about.as_deref().map(clean_content).unwrap_or_default(),
        ];
        if self.reference_sections {
            parts.push(REFERENCE_SCAFFOLD.to_string());
        }
        assemble(parts)
    }
}

fn npub(pubkey: &str) -> Option<String> {
    PublicKey::from_hex(pubkey).ok()?.to_bech32().ok()
}
