use colored::Colorize;

const BANNER: &str = r#"
  888               888            d8b 888
  888               888            Y8P 888
  888               888                888
  888  888 .d8888b  888888 888d888 888 888  888  .d88b.
  888 .88P 88K      888    888P"   888 888 .88P d8P  Y8b
  888888K  "Y8888b. 888    888     888 888888K  88888888
  888 "88b      X88 Y88b.  888     888 888 "88b Y8b.
  888  888  88888P'  "Y888 888     888 888  888  "Y8888
"#;

pub fn print(version: &str) {
    println!("{}", BANNER.red());
    println!(
        "  {} v{} — kubelet API attack-surface auditor",
        "kstrike".bold(),
        version
    );
    println!("  {}", "for authorized security assessments only".dimmed());
    println!();
    println!("  type 'help' for commands, 'connect' to begin");
    println!();
}
