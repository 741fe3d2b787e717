mod error;

use argh::FromArgs;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHasher, Version};

pub use error::Error;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "argon",
    description = "Hash a user password or OIDC CLI secret following the argon2id algorithm"
)]
pub struct Options {}

pub struct Command {}

impl Command {
    pub fn run() -> Result<(), Error> {
        let password = rpassword::prompt_password("Input Password: ")?;
        let confirmation = rpassword::prompt_password("Confirm Password: ")?;
        if password != confirmation {
            return Err(Error::Input("passwords do not match".to_string()));
        }

        let hash = generate_password(&password)?;
        println!("{hash}");
        Ok(())
    }
}

/// PHC string accepted by the local authenticator and the OIDC CLI secret check.
fn generate_password(password: &str) -> Result<String, Error> {
    if password.is_empty() {
        return Err(Error::Input("password must not be empty".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());
    let hash = argon.hash_password(password.as_bytes(), &salt)?;

    Ok(hash.to_string())
}
