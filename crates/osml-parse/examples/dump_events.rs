use std::io::Read;

use osml_parse::{CollectingLogger, NoSources, OsmlParser, SourceId, dump_events};

fn main() {
    let mut source = String::new();
    std::io::stdin().read_to_string(&mut source).unwrap();

    let parser = OsmlParser::default();
    let mut logger = CollectingLogger::new();
    let result = parser.parse(SourceId(0), source.as_bytes(), &mut logger, &mut NoSources);

    println!("=== Events ===");
    match result {
        Ok(events) => print!("{}", dump_events(&events)),
        Err(err) => println!("fatal: {err}"),
    }

    println!("\n=== Diagnostics ===");
    for diagnostic in logger.diagnostics() {
        eprint!("{}", diagnostic.render("<stdin>", &source));
    }
}
