use transporter_poisson::app::run;

fn main() -> color_eyre::Result<()> {
    run()
}
