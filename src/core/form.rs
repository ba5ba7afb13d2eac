use std::collections::HashMap;

/// A decoded `application/x-www-form-urlencoded` request body.
///
/// Fields that were not submitted read as empty strings, so a bare POST
/// reaches the handler and fails validation instead of being rejected
/// outright. Repeated keys keep the last value.
#[derive(Debug, Default)]
pub struct Form {
    fields: HashMap<String, String>,
}

impl Form {
    pub fn parse(body: &[u8]) -> Self {
        let mut fields = HashMap::new();
        let body = String::from_utf8_lossy(body);

        for pair in body.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = match pair.find('=') {
                Some(eq_idx) => (&pair[..eq_idx], &pair[eq_idx + 1..]),
                None => (pair, ""),
            };
            fields.insert(decode(key), decode(value));
        }

        Form { fields }
    }

    pub fn field(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or_default()
    }
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.replace('+', " "))
}
