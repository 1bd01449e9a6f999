mod app;
mod cli;

fn main() {
    let cli = cli::parse();
    hevc_batch::logging::init(cli.verbose);
    app::run(cli);
}
