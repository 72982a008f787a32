use custom_eh_cli::cli::custom_eh_main;

fn main() {
    custom_eh_main();
}
