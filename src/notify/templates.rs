use crate::models::delivery::DeliveryRecord;
use crate::models::order::Order;
use crate::models::user::User;
use crate::models::vendor::Vendor;
use crate::notify::Email;

pub fn unassigned_order_alert(ops_email: &str, order: &Order, vendor: &Vendor) -> Email {
    Email {
        to: ops_email.to_string(),
        subject: "Unassigned Order Alert".to_string(),
        html: format!(
            "<h2>Order {} could not be assigned</h2>\
             <p><strong>Vendor:</strong> {} - {}</p>\
             <p><strong>Drop-off:</strong> {}</p>\
             <p>Please take manual action.</p>",
            order.id,
            escape(&vendor.name),
            escape(&vendor.location.address),
            escape(&order.drop_off_location.address)
        ),
    }
}

pub fn order_delayed(customer: &User, order: &Order) -> Email {
    Email {
        to: customer.email.clone(),
        subject: "Order Delay Notification".to_string(),
        html: format!(
            "<h2>Your Order is Delayed</h2>\
             <p>A delivery partner could not be assigned immediately for your order \
             <strong>{}</strong>.</p>\
             <p>Your delivery will be on the way as soon as possible.</p>",
            order.id
        ),
    }
}

pub fn order_allocated(courier: &User, delivery: &DeliveryRecord) -> Email {
    Email {
        to: courier.email.clone(),
        subject: "Order Allocation".to_string(),
        html: format!(
            "<h2>Order Successfully Allocated</h2>\
             <p>Please pick up the order in time.</p>\
             <p><strong>Pickup:</strong> {}</p>\
             <p><strong>Drop-off:</strong> {}</p>",
            escape(&delivery.pickup_location.address),
            escape(&delivery.dropoff_location.address)
        ),
    }
}

pub fn delivery_canceled_customer(customer: &User, reason: &str) -> Email {
    Email {
        to: customer.email.clone(),
        subject: "Delivery Canceled".to_string(),
        html: format!(
            "<h2>Your delivery was canceled</h2>\
             <p>Reason: {}</p>\
             <p>We will assign another rider soon.</p>",
            escape(reason)
        ),
    }
}

pub fn delivery_canceled_ops(
    ops_email: &str,
    delivery: &DeliveryRecord,
    courier: &User,
    reason: &str,
) -> Email {
    Email {
        to: ops_email.to_string(),
        subject: "Delivery Canceled".to_string(),
        html: format!(
            "<h2>Delivery {} has been canceled</h2>\
             <p><strong>Order:</strong> {}</p>\
             <p><strong>Courier:</strong> {} ({})</p>\
             <p><strong>Reason:</strong> {}</p>",
            delivery.id,
            delivery.order,
            escape(&courier.name),
            escape(&courier.email),
            escape(reason)
        ),
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape;

    #[test]
    fn markup_in_free_text_is_escaped() {
        assert_eq!(
            escape("<b>tyre</b> & \"rain\""),
            "&lt;b&gt;tyre&lt;/b&gt; &amp; &quot;rain&quot;"
        );
    }
}
