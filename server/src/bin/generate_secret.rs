use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use color_eyre::eyre::Result;
use rand::{thread_rng, RngCore};

fn main() -> Result<()> {
    color_eyre::install()?;

    // 64 bytes of CSPRNG output, the same width as the HMAC block
    let mut secret = [0u8; 64];
    thread_rng().fill_bytes(&mut secret);

    let encoded = URL_SAFE_NO_PAD.encode(secret);

    println!("Generated session signing secret:");
    println!("{encoded}");
    println!();
    println!("Use it as your SESSION_SECRET environment variable:");
    println!("SESSION_SECRET=\"{encoded}\"");

    Ok(())
}
