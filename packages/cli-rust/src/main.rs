//! netinv CLI - Install packages on, copy files to and scan fleets of SSH hosts

fn main() -> anyhow::Result<()> {
    netinv::run()
}
