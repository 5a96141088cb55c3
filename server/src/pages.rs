// server/src/pages.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

//! HTML served by the verification endpoints: a static template
//! parameterized by the token, and one generic error page.
//!
//! The page wires the browser side of the flow: connect a Phantom/Solflare
//! wallet, sign the literal token message, POST the result back.

use crate::token::signing_message;

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Solana Wallet Verification</title>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            min-height: 100vh; display: flex; align-items: center; justify-content: center;
        }
        .container {
            background: white; border-radius: 16px; padding: 2rem; max-width: 500px; width: 90%;
            box-shadow: 0 20px 40px rgba(0,0,0,0.1); text-align: center;
        }
        h1 { color: #333; margin-bottom: 0.5rem; }
        .description { color: #666; margin-bottom: 2rem; line-height: 1.6; }
        .message-to-sign {
            font-family: 'Courier New', monospace; background: #2d3748; color: #e2e8f0;
            padding: 1rem; border-radius: 8px; margin: 1rem 0; word-break: break-all;
        }
        .btn {
            background: #667eea; color: white; border: none; padding: 12px 24px;
            border-radius: 8px; font-size: 1rem; cursor: pointer; margin: 0.5rem;
        }
        .btn:disabled { background: #ccc; cursor: not-allowed; }
        .status { margin-top: 1rem; padding: 1rem; border-radius: 8px; display: none; }
        .status.success { background: #d4edda; color: #155724; }
        .status.error { background: #f8d7da; color: #721c24; }
        .status.info { background: #d1ecf1; color: #0c5460; }
    </style>
</head>
<body>
    <div class="container">
        <h1>Verify Your Solana Wallet</h1>
        <p class="description">
            Connect your wallet and sign a message to prove ownership and unlock
            XP earning in the Discord server.
        </p>
        <div>
            <strong>Message to sign:</strong>
            <div class="message-to-sign">{{message}}</div>
        </div>
        <button id="connectBtn" class="btn" onclick="connectWallet()">Connect Wallet</button>
        <button id="signBtn" class="btn" onclick="signMessage()" style="display: none;" disabled>Sign Message</button>
        <div id="status" class="status"></div>
    </div>
    <script>
        let provider = null;
        let walletAddress = null;
        const messageToSign = "{{message}}";

        function showStatus(type, message) {
            const el = document.getElementById('status');
            el.className = 'status ' + type;
            el.textContent = message;
            el.style.display = 'block';
        }

        async function connectWallet() {
            if (window.solana && window.solana.isPhantom) {
                provider = window.solana;
            } else if (window.solflare && window.solflare.isSolflare) {
                provider = window.solflare;
            } else {
                showStatus('error', 'Please install Phantom or Solflare wallet extension');
                return;
            }
            try {
                const response = await provider.connect();
                walletAddress = response.publicKey.toString();
                showStatus('success', 'Connected: ' + walletAddress);
                document.getElementById('connectBtn').style.display = 'none';
                const signBtn = document.getElementById('signBtn');
                signBtn.style.display = 'inline-block';
                signBtn.disabled = false;
            } catch (error) {
                showStatus('error', 'Failed to connect wallet: ' + error.message);
            }
        }

        async function signMessage() {
            if (!walletAddress || !provider) {
                showStatus('error', 'Please connect your wallet first');
                return;
            }
            try {
                showStatus('info', 'Please sign the message in your wallet...');
                const encoded = new TextEncoder().encode(messageToSign);
                const signed = await provider.signMessage(encoded, 'utf8');
                const response = await fetch('/api/verify', {
                    method: 'POST',
                    headers: { 'Content-Type': 'application/json' },
                    body: JSON.stringify({
                        token: '{{token}}',
                        walletAddress: walletAddress,
                        signature: Array.from(signed.signature)
                    })
                });
                const result = await response.json();
                if (result.success) {
                    showStatus('success', result.message + ' You can close this page and return to Discord.');
                    document.getElementById('signBtn').disabled = true;
                } else {
                    showStatus('error', result.error || 'Verification failed');
                }
            } catch (error) {
                showStatus('error', 'Failed to sign message: ' + error.message);
            }
        }
    </script>
</body>
</html>
"#;

const ERROR_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Verification Error</title>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            min-height: 100vh; display: flex; align-items: center; justify-content: center;
        }
        .container {
            background: white; border-radius: 16px; padding: 2rem; max-width: 500px; width: 90%;
            box-shadow: 0 20px 40px rgba(0,0,0,0.1); text-align: center;
        }
        .error { color: #721c24; background: #f8d7da; padding: 1rem; border-radius: 8px; }
        .hint { margin-top: 1rem; color: #666; }
    </style>
</head>
<body>
    <div class="container">
        <h1>Verification Error</h1>
        <div class="error">Invalid or expired verification token</div>
        <p class="hint">Please request a new verification link from the Discord server.</p>
    </div>
</body>
</html>
"#;

pub fn verification_page(token: &str) -> String {
    PAGE_TEMPLATE
        .replace("{{message}}", &signing_message(token))
        .replace("{{token}}", token)
}

/// One page for every failure mode, so the URL leaks nothing about whether a
/// token existed.
pub fn error_page() -> String {
    ERROR_TEMPLATE.to_string()
}
