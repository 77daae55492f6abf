/// Make a body safe to embed in a UTF-8 document.
///
/// Valid UTF-8 is kept verbatim. In anything else, valid runs are kept,
/// stray ASCII bytes are kept as characters and every other invalid byte
/// is dropped.
pub fn repair_utf8(data: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(data) {
        return text.to_string();
    }

    let mut out = String::with_capacity(data.len());
    for chunk in data.utf8_chunks() {
        out.push_str(chunk.valid());
        out.extend(
            chunk
                .invalid()
                .iter()
                .filter(|byte| byte.is_ascii())
                .map(|&byte| char::from(byte)),
        );
    }
    out
}
