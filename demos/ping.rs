//! Smallest possible weft program, using the entry point attribute.

#[weft::main]
fn main() {
    weft::spawn(|| println!("pong")).unwrap();

    println!("ping");
}
