fn main() {
    groundpoint::cli::run();
}
