//! Static service definition templates.
//!
//! Placeholders are written as `##KEY##` and substituted by [`render`].

use crate::service::errors::ServiceError;
use anyhow::{bail, Result};
use std::collections::HashMap;

pub const INIT_SCRIPT: &str = "init-script";
pub const SYSTEMD_UNIT: &str = "systemd-unit";

const INIT_SCRIPT_TEMPLATE: &str = r###"#!/bin/bash

### BEGIN INIT INFO
# Provides:          ##NAME##
# Required-Start:    ##DEPENDENCIES##
# Required-Stop:
# Default-Start:     ##RUN_LEVELS_ARR##
# Default-Stop:      0 1 6
# Short-Description: Start ##NAME## at boot time
# Description:       Enable ##NAME## service.
### END INIT INFO

# chkconfig:   ##RUN_LEVELS_STR## 99 1
# description: ##NAME##

umask 0007

set_pid () {
	unset PID
	_PID=`head -1 "##PID_FILE##" 2>/dev/null`
	if [ $_PID ]; then
		kill -0 $_PID 2>/dev/null && PID=$_PID
	fi
}

force_reload () {
	stop
	start
}

restart () {
	stop
	start
}

start () {
	CNT=5

	set_pid

	if [ -z "$PID" ]; then
		echo starting ##NAME##

		##COMMAND## >/dev/null 2>&1 &

		echo $! > "##PID_FILE##"

		while [ : ]; do
			set_pid

			if [ -n "$PID" ]; then
				echo started ##NAME##
				break
			else
				if [ $CNT -gt 0 ]; then
					sleep 1
					CNT=`expr $CNT - 1`
				else
					echo ERROR - failed to start ##NAME##
					break
				fi
			fi
		done
	else
		echo ##NAME## is already started
	fi
}

status () {
	set_pid

	if [ -z "$PID" ]; then
		exit 1
	else
		exit 0
	fi
}

stop () {
	CNT=5

	set_pid

	if [ -n "$PID" ]; then
		echo stopping ##NAME##

		kill $PID

		while [ : ]; do
			set_pid

			if [ -z "$PID" ]; then
				rm "##PID_FILE##"
				echo stopped ##NAME##
				break
			else
				if [ $CNT -gt 0 ]; then
					sleep 1
					CNT=`expr $CNT - 1`
				else
					echo ERROR - failed to stop ##NAME##
					break
				fi
			fi
		done
	else
		echo ##NAME## is already stopped
	fi
}

case $1 in
	force-reload)
		force_reload
		;;
	restart)
		restart
		;;
	start)
		start
		;;
	status)
		status
		;;
	stop)
		stop
		;;
	*)
		echo "usage: $0 <force-reload|restart|start|status|stop>"
		exit 1
		;;
esac
"###;

const SYSTEMD_UNIT_TEMPLATE: &str = r#"[Unit]
Description=##NAME##
After=network.target
Requires=##DEPENDENCIES##

[Service]
Type=simple
StandardOutput=null
StandardError=null
UMask=0007
ExecStart=##COMMAND##

[Install]
WantedBy=##SYSTEMD_WANTED_BY##
"#;

fn template(name: &str) -> Option<&'static str> {
    match name {
        INIT_SCRIPT => Some(INIT_SCRIPT_TEMPLATE),
        SYSTEMD_UNIT => Some(SYSTEMD_UNIT_TEMPLATE),
        _ => None,
    }
}

/// Returns the key of a `##KEY##` placeholder at the start of `text`
fn placeholder(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("##")?;
    let end = rest.find("##")?;
    let key = &rest[..end];
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
        return None;
    }

    Some(key)
}

/// Fills the named template. A placeholder without a value is an error.
pub fn render(name: &str, vars: &HashMap<&str, String>) -> Result<String> {
    let mut text = match template(name) {
        Some(text) => text,
        None => bail!(ServiceError::render_failure(name, "unknown template")),
    };

    let mut out = String::with_capacity(text.len());
    while let Some(at) = text.find("##") {
        out.push_str(&text[..at]);
        text = &text[at..];

        let key = match placeholder(text) {
            Some(key) => key,
            None => {
                out.push('#');
                text = &text[1..];
                continue;
            }
        };

        match vars.get(key) {
            Some(value) => out.push_str(value),
            None => bail!(ServiceError::render_failure(
                name,
                format!("missing value for placeholder {}", key)
            )),
        }
        text = &text[key.len() + 4..];
    }
    out.push_str(text);

    Ok(out)
}
