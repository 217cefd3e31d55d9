//! Header normalization and string similarity.

/// Header split into lower-case alphanumeric tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedHeader {
    /// Tokens in original order
    pub tokens: Vec<String>,
    /// Tokens concatenated in original order
    pub compact: String,
    /// Tokens concatenated in lexicographic order
    pub sorted: String,
}

impl NormalizedHeader {
    /// Normalizes a header or a vocabulary term.
    ///
    /// `"palletID"`, `"Pallet-Id"` and `"PALLET id"` all yield `["pallet", "id"]`.
    pub fn new(raw: &str) -> Self {
        let tokens = tokenize(raw);
        let compact = tokens.concat();
        let mut ordered = tokens.clone();
        ordered.sort();
        let sorted = ordered.concat();
        Self {
            tokens,
            compact,
            sorted,
        }
    }

    /// Returns true if the header has no alphanumeric content.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

fn tokenize(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower_or_digit = false;

    for ch in raw.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower_or_digit = false;
            continue;
        }
        // camelCase boundary
        if ch.is_uppercase() && prev_lower_or_digit && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev_lower_or_digit = ch.is_lowercase() || ch.is_numeric();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Character-level Levenshtein distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Token-order-insensitive edit distance: the smaller of the compact and
/// sorted form distances.
pub fn edit_distance(header: &NormalizedHeader, target: &NormalizedHeader) -> usize {
    levenshtein(&header.compact, &target.compact).min(levenshtein(&header.sorted, &target.sorted))
}

/// Similarity for a distance against a target of the given length, in `[0, 1]`.
pub fn similarity_from_distance(distance: usize, target_len: usize) -> f64 {
    if target_len == 0 {
        return 0.0;
    }
    (1.0 - distance as f64 / target_len as f64).max(0.0)
}

/// Similarity of a header to a target term.
pub fn similarity(header: &NormalizedHeader, target: &NormalizedHeader) -> f64 {
    similarity_from_distance(
        edit_distance(header, target),
        target.compact.chars().count(),
    )
}

/// Whether a header token hits a semantic keyword: equality, or a prefix
/// relation where the shorter side has at least 3 characters.
pub fn keyword_hit(token: &str, keyword: &str) -> bool {
    if token == keyword {
        return true;
    }
    let (short, long) = if token.len() <= keyword.len() {
        (token, keyword)
    } else {
        (keyword, token)
    };
    short.chars().count() >= 3 && long.starts_with(short)
}

/// Strips one trailing plural `s`.
pub fn singular(compact: &str) -> &str {
    compact.strip_suffix('s').unwrap_or(compact)
}
