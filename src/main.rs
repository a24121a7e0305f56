fn main() -> std::process::ExitCode {
    equiroute_lib::run()
}
