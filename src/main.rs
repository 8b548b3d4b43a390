fn main() -> std::process::ExitCode {
    forge_infotext_lib::run()
}
