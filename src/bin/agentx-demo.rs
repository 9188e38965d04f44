#[macro_use]
extern crate log;

use agentx_subagent::configuration::*;
use agentx_subagent::transport::{self, Transport};
use agentx_subagent::{
    CloseReason, Computed, Oid, Registration, Result, Scalar, Session, Value, ValueKind,
};

use std::time::Instant;

#[tokio::main]
async fn main() {
    env_logger::init();

    let args = Configuration::parse();
    args.validate().expect("Configuration is broken!"); // Panic if configuration is messed up!

    info!("Configuration valid. Starting up...");

    let result = match args.tcp {
        Some(addr) => match transport::connect_tcp(addr).await {
            Ok(transport) => serve(transport, &args).await,
            Err(e) => Err(e),
        },
        None => match transport::connect_unix(&args.socket).await {
            Ok(transport) => serve(transport, &args).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        error!("agentx-demo failed: {}", e);
        std::process::exit(1);
    }
}

/// Instance OID of scalar `leaf` below the demo subtree.
fn object(subtree: &Oid, leaf: u32) -> Oid {
    subtree.child(leaf).child(0)
}

async fn serve<T: Transport>(transport: T, conf: &Configuration) -> Result<()> {
    let mut session = Session::open(transport, conf.session_config()).await?;

    let mut events = session.events();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Session event: {:?}", event);
        }
    });

    session
        .register_subtree(Registration::new(conf.subtree.clone()))
        .await?;

    // .1.0 uptime in hundredths of a second
    let started = Instant::now();
    session.add_variable(
        object(&conf.subtree, 1),
        Computed::new(ValueKind::TimeTicks, move || {
            Ok(Value::TimeTicks((started.elapsed().as_millis() / 10) as u32))
        }),
    )?;
    // .2.0 free-form label, writable by managers
    session.add_variable(
        object(&conf.subtree, 2),
        Scalar::writable(Value::string(&conf.description)),
    )?;
    // .3.0 how often this counter has been read
    let mut reads: u32 = 0;
    session.add_variable(
        object(&conf.subtree, 3),
        Computed::new(ValueKind::Counter32, move || {
            reads = reads.wrapping_add(1);
            Ok(Value::Counter32(reads))
        }),
    )?;

    info!("Serving {} objects under {}", session.variables().len(), conf.subtree);

    let interrupted = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupted, shutting down"),
            Err(e) => {
                error!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await
            }
        }
    };
    let result = session.run_until(interrupted).await;

    session.close(CloseReason::Shutdown).await;
    result
}
