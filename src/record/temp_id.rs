use uuid::Uuid;

pub(crate) const TEMP_ID_PREFIX: &str = "tmp-";

/// `"tmp-"` plus a hyphenated v4 UUID.
pub(crate) const TEMP_ID_LEN: usize = 40;

/// A locally generated id for a record the server has not seen yet. The
/// prefix and fixed length make it recognizable, so newness is derived from
/// the id itself rather than tracked as separate state.
pub(crate) fn temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4())
}

pub(crate) fn is_temp_id(id: &str) -> bool {
    id.len() == TEMP_ID_LEN && id.starts_with(TEMP_ID_PREFIX)
}
