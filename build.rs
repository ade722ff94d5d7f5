fn main() {
    // Host-side test builds run with `--no-default-features` and have no
    // ESP-IDF toolchain environment to forward.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
