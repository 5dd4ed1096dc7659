fn main() {
    sbes_pipeline::cli::run();
}
