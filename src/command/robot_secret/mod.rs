mod error;

use argh::FromArgs;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::command::server::auth::robot::hash_secret;

pub use error::Error;

const SALT_LENGTH: usize = 32;
const MIN_SECRET_LENGTH: usize = 8;
const MAX_SECRET_LENGTH: usize = 128;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "robot-secret",
    description = "Hash a robot account secret for the store configuration"
)]
pub struct Options {}

pub struct Command {}

#[derive(Debug, PartialEq)]
struct HashedSecret {
    salt: String,
    secret_hash: String,
}

impl Command {
    pub fn run() -> Result<(), Error> {
        let secret = rpassword::prompt_password("Input Robot Secret: ")?;
        let hashed = hash_robot_secret(&secret, generate_salt())?;

        println!("salt = \"{}\"", hashed.salt);
        println!("secret_hash = \"{}\"", hashed.secret_hash);
        Ok(())
    }
}

fn generate_salt() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LENGTH)
        .map(char::from)
        .collect()
}

fn validate_secret(secret: &str) -> Result<(), Error> {
    let length = secret.chars().count();
    if !(MIN_SECRET_LENGTH..=MAX_SECRET_LENGTH).contains(&length) {
        return Err(Error::InvalidSecret(format!(
            "length must be between {MIN_SECRET_LENGTH} and {MAX_SECRET_LENGTH} characters"
        )));
    }

    let has_upper = secret.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = secret.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = secret.chars().any(|c| c.is_ascii_digit());
    if !(has_upper && has_lower && has_digit) {
        return Err(Error::InvalidSecret(
            "must contain at least one uppercase letter, one lowercase letter and one digit"
                .to_string(),
        ));
    }

    Ok(())
}

fn hash_robot_secret(secret: &str, salt: String) -> Result<HashedSecret, Error> {
    validate_secret(secret)?;
    Ok(HashedSecret {
        secret_hash: hash_secret(secret, &salt),
        salt,
    })
}
