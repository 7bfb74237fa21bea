extern crate shpreader;

use std::env;
use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use shpreader::read::shapefile::{self, ReadOptions};

/// Prints a shapefile's header, then each of its geometries.
///
/// With `--sequential`, ignores the ".shx" and reads records back to back.
fn main() {
    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let sequential = args.iter().any(|a| a == "--sequential");
    args.retain(|a| a != "--sequential");

    if args.len() != 1 {
        writeln!(&mut io::stderr(), "Usage: {} [--sequential] <SHP_PATH>", program).unwrap();
        process::exit(1);
    }

    let path = PathBuf::from(&args[0]);
    let options = ReadOptions::new()
        .use_index(!sequential)
        .dbf_encoding(encoding::all::WINDOWS_1252);

    match shapefile::open_with(&path, options) {
        Err(err) => {
            writeln!(&mut io::stderr(), "{}", err).unwrap();
            process::exit(1);
        }
        Ok(session) => {
            if let Some(header) = session.header() {
                println!("{}", header);
            }
            if let Some(table) = session.table() {
                println!("{}", table);
            }

            let mut n_geometries: usize = 0;
            let mut n_errors: usize = 0;

            for geometry_result in session {
                match geometry_result {
                    Err(err) => {
                        n_errors += 1;
                        writeln!(&mut io::stderr(), "Error during read: {}", err).unwrap();
                    }
                    Ok(geometry) => {
                        n_geometries += 1;
                        println!("{}", geometry);
                    }
                }
            }

            println!("Read {} geometries ({} errors)", n_geometries, n_errors);
        }
    }
}
