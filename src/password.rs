use argon2::{
    Argon2,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

pub const MIN_LENGTH: usize = 8;

/// Similarity ratio at or above which a password is rejected as too close to
/// one of the user's own attributes.
const MAX_SIMILARITY: f64 = 0.7;

/// Passwords rejected outright regardless of length. Compared case-insensitively.
/// Entries shorter than `MIN_LENGTH` are left out.
const COMMON_PASSWORDS: &[&str] = &[
    "00000000", "11111111", "12121212", "123123123", "12341234", "123456789",
    "1234567890", "12345678", "123qweasd", "147258369", "1q2w3e4r", "1q2w3e4r5t",
    "1qaz2wsx", "22222222", "55555555", "66666666", "654321654321", "87654321",
    "88888888", "987654321", "99999999", "aaaaaaaa", "abc12345", "abcd1234",
    "abcdefgh", "access14", "admin123", "administrator", "alexander", "anthony1",
    "asdf1234", "asdfasdf", "asdfghjk", "asdfghjkl", "babygirl1", "baseball",
    "basketball", "batman123", "benjamin", "blink182", "buster123", "butterfly",
    "changeme", "charlie1", "charlie123", "cheese123", "chelsea1", "chocolate",
    "computer", "corvette", "cowboys1", "danielle", "december", "dolphins",
    "dragon123", "elizabeth", "football", "football1", "freedom1", "friends1",
    "gateway1", "goodluck", "hello123", "helloworld", "hockey123", "hunter123",
    "iloveyou", "iloveyou1", "iloveyou2", "internet", "jennifer", "jessica1",
    "jordan23", "jonathan", "killer123", "letmein1", "letmein123", "liverpool",
    "login123", "lovelove", "maggie123", "manchester", "marlboro", "master123",
    "matthew1", "maverick", "mercedes", "metallica", "michael1", "michelle",
    "midnight", "monkey123", "mustang1", "nicholas", "november", "passw0rd",
    "password", "password!", "password1", "password12", "password123", "password2",
    "patrick1", "pepper123", "phoenix1", "princess", "princess1", "q1w2e3r4",
    "q1w2e3r4t5", "qazwsxedc", "qwer1234", "qwerty12", "qwerty123", "qwertyui",
    "qwertyuiop", "rainbow1", "samantha", "scorpion", "shadow123", "sebastian",
    "september", "soccer123", "starwars", "steelers", "summer123", "sunshine",
    "sunshine1", "superman", "superman1", "taylor123", "thomas123", "thunder1",
    "tigger123", "trustno1", "victoria", "welcome1", "welcome123", "whatever",
    "william1", "winter123", "yankees1", "zaq12wsx", "zxcvbnm1", "zxcvbnm123",
];

/// hash_password
///
/// Hashes with argon2id and a fresh random salt. The result is a PHC string
/// carrying algorithm, parameters and salt, so it can be verified on its own.
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// A stored hash that does not parse is treated as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

/// validate_password
///
/// Strength policy for a new password. Returns every failed rule's message;
/// an empty list means the password is acceptable.
pub fn validate_password(password: &str, username: &str, email: &str) -> Vec<String> {
    let mut problems = Vec::new();

    for (value, label) in [(username, "username"), (email, "email address")] {
        if too_similar(password, value) {
            problems.push(format!("The password is too similar to the {label}."));
        }
    }

    if password.chars().count() < MIN_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {MIN_LENGTH} characters."
        ));
    }

    let lowered = password.trim().to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push("This password is too common.".to_string());
    }

    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }

    problems
}

/// Compares against the whole attribute and each of its word-separated parts,
/// case-insensitively.
fn too_similar(password: &str, attribute: &str) -> bool {
    if attribute.is_empty() {
        return false;
    }
    let password = password.to_lowercase();
    let attribute = attribute.to_lowercase();
    std::iter::once(attribute.as_str())
        .chain(attribute.split(|c: char| !c.is_alphanumeric() && c != '_'))
        .filter(|part| !part.is_empty())
        .any(|part| strsim::normalized_levenshtein(&password, part) >= MAX_SIMILARITY)
}
